use serde_json::Value;

/// Outgoing header attached to a single call
///
/// The value may be any JSON value. On the wire it becomes ASCII metadata
/// keyed by `name`: string values are sent verbatim, everything else as JSON
/// text. The namespace is kept for code inspecting the call scope; gRPC
/// metadata has no slot for it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingHeader {
  namespace: String,
  name: String,
  value: Value,
}

impl OutgoingHeader {
  pub fn new(namespace: impl Into<String>, name: impl Into<String>, value: impl Into<Value>) -> Self {
    Self {
      namespace: namespace.into(),
      name: name.into(),
      value: value.into(),
    }
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn value(&self) -> &Value {
    &self.value
  }

  /// Text sent as the metadata value
  pub fn wire_value(&self) -> String {
    match &self.value {
      Value::String(s) => s.clone(),
      other => other.to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_wire_value() {
    assert_eq!(OutgoingHeader::new("ns", "a", "plain").wire_value(), "plain");
    assert_eq!(OutgoingHeader::new("ns", "b", 42).wire_value(), "42");
    assert_eq!(OutgoingHeader::new("ns", "c", true).wire_value(), "true");
    assert_eq!(
      OutgoingHeader::new("ns", "d", json!({"tenant": 7})).wire_value(),
      r#"{"tenant":7}"#
    );
  }
}
