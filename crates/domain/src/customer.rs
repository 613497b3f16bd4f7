//! Guest customer resolution.

use order_store::NewCustomer;

use crate::order::ShippingAddress;

/// Splits a full name into first and last name.
///
/// The first whitespace-separated token is the first name; the remaining
/// tokens joined by single spaces form the last name.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let mut tokens = full_name.split_whitespace();
    let first = tokens.next().unwrap_or_default().to_string();
    let last = tokens.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Builds the customer record for a guest checkout, if the address names one.
pub(crate) fn guest_customer(address: &ShippingAddress) -> Option<NewCustomer> {
    let (first_name, last_name) = split_full_name(&address.full_name);
    if first_name.is_empty() {
        return None;
    }

    Some(NewCustomer {
        first_name,
        last_name,
        email: non_blank(address.email.as_deref()),
        phone: non_blank(address.phone.as_deref()),
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_name() {
        assert_eq!(split_full_name(""), (String::new(), String::new()));
        assert_eq!(split_full_name("   "), (String::new(), String::new()));
        assert_eq!(split_full_name("Abebe"), ("Abebe".into(), String::new()));
        assert_eq!(
            split_full_name("  Abebe   Kebede "),
            ("Abebe".into(), "Kebede".into())
        );
        assert_eq!(
            split_full_name("Abebe Kebede Tesfaye"),
            ("Abebe".into(), "Kebede Tesfaye".into())
        );
    }

    #[test]
    fn test_guest_customer_requires_a_name() {
        assert!(guest_customer(&ShippingAddress::new("  ")).is_none());

        let customer = guest_customer(
            &ShippingAddress::new("Abebe Kebede")
                .with_phone("+251911000000")
                .with_email(" "),
        )
        .unwrap();
        assert_eq!(customer.first_name, "Abebe");
        assert_eq!(customer.last_name, "Kebede");
        assert_eq!(customer.phone.as_deref(), Some("+251911000000"));
        assert_eq!(customer.email, None);
    }
}
