//! Location to endpoint and region mapping
//!
//! Bucket locations come back from the store either as a legacy constraint
//! (`US`, `EU`) or as a region name. Public URL prefixes use the legacy
//! host names; the SDK client needs a region.

/// Public host name for a bucket location
pub fn endpoint_for_location(location: &str) -> String {
    match location {
        "" | "US" => "s3.amazonaws.com".to_string(),
        "EU" => "s3-eu-west-1.amazonaws.com".to_string(),
        other => format!("s3-{}.amazonaws.com", other),
    }
}

/// SDK region for a bucket location
pub fn region_for_location(location: &str) -> String {
    match location.trim() {
        "" | "US" => "us-east-1".to_string(),
        "EU" => "eu-west-1".to_string(),
        other => other.to_string(),
    }
}

/// URL prefix suggested for a bucket, `http://<endpoint>/<bucket>/`
pub fn bucket_url_prefix(location: &str, bucket: &str) -> String {
    format!("http://{}/{}/", endpoint_for_location(location), bucket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_locations() {
        assert_eq!(endpoint_for_location("US"), "s3.amazonaws.com");
        assert_eq!(endpoint_for_location("EU"), "s3-eu-west-1.amazonaws.com");
        assert_eq!(
            endpoint_for_location("ap-southeast-2"),
            "s3-ap-southeast-2.amazonaws.com"
        );
    }

    #[test]
    fn test_regions() {
        assert_eq!(region_for_location("US"), "us-east-1");
        assert_eq!(region_for_location(""), "us-east-1");
        assert_eq!(region_for_location("EU"), "eu-west-1");
        assert_eq!(region_for_location("eu-central-1"), "eu-central-1");
    }

    #[test]
    fn test_bucket_url_prefix() {
        assert_eq!(
            bucket_url_prefix("EU", "media"),
            "http://s3-eu-west-1.amazonaws.com/media/"
        );
    }
}
