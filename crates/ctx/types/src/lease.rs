//! Lease payload carried by registration, renewal and lease-end replies.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::message::{DataObject, DecodeResult, FromDataObject, ToDataObject};

/// Requested validity of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    #[serde(with = "crate::duration_ms")]
    pub duration: Duration,
}

impl Lease {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }
}

impl ToDataObject for Lease {
    fn to_data_object(&self) -> DataObject {
        DataObject::new("lease").with_child(DataObject::leaf(
            "durationMs",
            self.duration.as_millis() as u64,
        ))
    }
}

impl FromDataObject for Lease {
    fn from_data_object(data: &DataObject) -> DecodeResult<Self> {
        data.expect_name("lease")?;
        Ok(Self::from_millis(data.parse_value("durationMs")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_wire_form() {
        let lease = Lease::new(Duration::from_secs(30));
        let data = lease.to_data_object();
        assert_eq!(data.value_of("durationMs"), Some("30000"));
        assert_eq!(Lease::from_data_object(&data).unwrap(), lease);
    }
}
