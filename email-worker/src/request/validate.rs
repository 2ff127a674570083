//! Structural validation of a [`SendRequest`].
//!
//! Checks run in a fixed order and the first failure wins, so the same
//! request always reports the same error.

use lettre::message::Mailbox;

use super::recipients::Recipients;
use super::types::SendRequest;
use crate::error::ValidationError;

pub fn validate(request: &SendRequest) -> Result<(), ValidationError> {
    if request.sender.is_empty() {
        return Err(ValidationError::Missing { field: "sender" });
    }
    check_address("sender", &request.sender)?;

    if request.subject.is_empty() {
        return Err(ValidationError::Missing { field: "subject" });
    }

    if request.inline_body().is_none() && request.template_name().is_none() {
        return Err(ValidationError::MissingContent);
    }

    if request.to.is_empty() {
        return Err(ValidationError::Missing { field: "to" });
    }
    check_all("to", &request.to)?;
    check_all("cc", &request.cc)?;
    check_all("bcc", &request.bcc)?;

    Ok(())
}

fn check_all(field: &'static str, recipients: &Recipients) -> Result<(), ValidationError> {
    recipients
        .iter()
        .try_for_each(|address| check_address(field, address))
}

/// Accepts `user@domain` and `Display Name <user@domain>`.
fn check_address(field: &'static str, address: &str) -> Result<(), ValidationError> {
    address
        .parse::<Mailbox>()
        .map(|_| ())
        .map_err(|e| ValidationError::InvalidAddress {
            field,
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> SendRequest {
        SendRequest {
            sender: "no-reply@example.com".to_string(),
            subject: "Hello".to_string(),
            body: Some("<p>Hi</p>".to_string()),
            to: Recipients::from("b@y.com"),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_request() {
        assert_eq!(validate(&valid_request()), Ok(()));
    }

    #[test]
    fn test_display_name_addresses_are_valid() {
        let request = SendRequest {
            sender: "Example <no-reply@example.com>".to_string(),
            cc: Recipients::from("Carol <c@y.com>"),
            ..valid_request()
        };
        assert_eq!(validate(&request), Ok(()));
    }

    #[test]
    fn test_missing_sender() {
        let request = SendRequest {
            sender: String::new(),
            ..valid_request()
        };
        assert_eq!(
            validate(&request),
            Err(ValidationError::Missing { field: "sender" })
        );
    }

    #[test]
    fn test_invalid_sender() {
        let request = SendRequest {
            sender: "not-an-address".to_string(),
            ..valid_request()
        };
        assert_eq!(validate(&request).unwrap_err().field(), "sender");
    }

    #[test]
    fn test_missing_subject() {
        let request = SendRequest {
            subject: String::new(),
            ..valid_request()
        };
        assert_eq!(
            validate(&request),
            Err(ValidationError::Missing { field: "subject" })
        );
    }

    #[test]
    fn test_missing_body_and_template() {
        let request = SendRequest {
            body: Some(String::new()),
            template: None,
            ..valid_request()
        };
        assert_eq!(validate(&request), Err(ValidationError::MissingContent));
    }

    #[test]
    fn test_template_without_body_is_valid() {
        let request = SendRequest {
            body: None,
            template: Some("welcome.html".to_string()),
            ..valid_request()
        };
        assert_eq!(validate(&request), Ok(()));
    }

    #[test]
    fn test_missing_to() {
        let request = SendRequest {
            to: Recipients::default(),
            ..valid_request()
        };
        assert_eq!(validate(&request), Err(ValidationError::Missing { field: "to" }));
    }

    #[test]
    fn test_reports_first_invalid_recipient() {
        let request = SendRequest {
            to: Recipients::new(vec![
                "ok@y.com".to_string(),
                "first-bad".to_string(),
                "second-bad".to_string(),
            ]),
            ..valid_request()
        };

        match validate(&request) {
            Err(ValidationError::InvalidAddress { field, address, .. }) => {
                assert_eq!(field, "to");
                assert_eq!(address, "first-bad");
            }
            other => panic!("Expected invalid \"to\", got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_cc_and_bcc() {
        let request = SendRequest {
            cc: Recipients::from("bad cc"),
            ..valid_request()
        };
        assert_eq!(validate(&request).unwrap_err().field(), "cc");

        let request = SendRequest {
            bcc: Recipients::from("@nope"),
            ..valid_request()
        };
        assert_eq!(validate(&request).unwrap_err().field(), "bcc");
    }

    #[test]
    fn test_fail_fast_order() {
        // Both sender and to are missing; sender is checked first.
        let request = SendRequest {
            sender: String::new(),
            to: Recipients::default(),
            ..valid_request()
        };
        assert_eq!(
            validate(&request),
            Err(ValidationError::Missing { field: "sender" })
        );
    }
}
