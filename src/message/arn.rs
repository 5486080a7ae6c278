//! Shape checks for the two ARN kinds a topic message carries.

use regex::Regex;
use std::sync::LazyLock;

static SNS_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws(-[^:]+)?:sns:([a-zA-Z0-9-]+):([0-9]{12}):([a-zA-Z_0-9+=,.@\-_/]+)$")
        .expect("static SNS ARN pattern")
});

static IAM_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws(-[^:]+)?:iam::([0-9]{12}):([a-zA-Z_0-9+=,.@\-_/]+)$")
        .expect("static IAM ARN pattern")
});

pub fn is_valid_sns_arn(arn: &str) -> bool {
    SNS_ARN.is_match(arn)
}

pub fn is_valid_iam_arn(arn: &str) -> bool {
    IAM_ARN.is_match(arn)
}

/// Extracts the region segment of a topic ARN.
///
/// Returns `None` when the ARN does not have the topic shape.
pub fn region_from_topic_arn(arn: &str) -> Option<&str> {
    SNS_ARN
        .captures(arn)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_arn_shapes() {
        assert!(is_valid_sns_arn("arn:aws:sns:us-west-2:012345678912:alerts"));
        assert!(is_valid_sns_arn("arn:aws-cn:sns:cn-north-1:012345678912:alerts"));
        assert!(!is_valid_sns_arn("arn:aws:sns:us-west-2:0123:alerts"));
        assert!(!is_valid_sns_arn("arn:aws:iam::012345678912:role/x"));
    }

    #[test]
    fn test_role_arn_shapes() {
        assert!(is_valid_iam_arn("arn:aws:iam::012345678912:role/alerting"));
        assert!(!is_valid_iam_arn("arn:aws:iam:us-east-1:012345678912:role/alerting"));
        assert!(!is_valid_iam_arn("role/alerting"));
    }

    #[test]
    fn test_region_extraction() {
        assert_eq!(
            region_from_topic_arn("arn:aws:sns:eu-central-1:012345678912:alerts"),
            Some("eu-central-1")
        );
        assert_eq!(region_from_topic_arn("not-an-arn"), None);
    }
}
