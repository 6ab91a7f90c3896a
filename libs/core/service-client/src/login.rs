use std::str::FromStr;

use strum::{Display, EnumString};

use crate::error::LoginMethodOutOfRange;

/// Authentication strategy used to open a channel
///
/// Selected once per [`ClientConfig`](crate::ClientConfig). The numeric codes
/// match the values used by existing configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LoginMethod {
  /// No authentication
  NoAuth = 0,
  /// Client certificate
  Certificate = 1,
  /// User name and password
  UserName = 2,
}

impl LoginMethod {
  /// Human readable description, suitable for settings screens
  pub fn description(&self) -> &'static str {
    match self {
      LoginMethod::NoAuth => "no authentication",
      LoginMethod::Certificate => "certificate",
      LoginMethod::UserName => "user name and password",
    }
  }

  pub(crate) fn binding_label(&self) -> &'static str {
    match self {
      LoginMethod::NoAuth => "no-auth",
      LoginMethod::Certificate => "certificate authentication",
      LoginMethod::UserName => "user name authentication",
    }
  }

  /// Numeric code of this login method
  pub fn code(&self) -> i64 {
    *self as i64
  }

  /// Parse a login method from either its numeric code or its name
  ///
  /// # Errors
  /// Returns [`LoginMethodOutOfRange`] when the value is neither a known code
  /// nor a known name.
  pub fn parse(raw: &str) -> Result<Self, LoginMethodOutOfRange> {
    let raw = raw.trim();
    match raw.parse::<i64>() {
      Ok(code) => Self::try_from(code),
      Err(_) => Self::from_str(raw).map_err(|_| LoginMethodOutOfRange(raw.to_string())),
    }
  }
}

impl TryFrom<i64> for LoginMethod {
  type Error = LoginMethodOutOfRange;

  fn try_from(code: i64) -> Result<Self, Self::Error> {
    match code {
      0 => Ok(LoginMethod::NoAuth),
      1 => Ok(LoginMethod::Certificate),
      2 => Ok(LoginMethod::UserName),
      other => Err(LoginMethodOutOfRange(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_codes_round_trip() {
    for method in [LoginMethod::NoAuth, LoginMethod::Certificate, LoginMethod::UserName] {
      assert_eq!(LoginMethod::try_from(method.code()).unwrap(), method);
    }
  }

  #[test]
  fn test_out_of_range_code() {
    let err = LoginMethod::try_from(3).unwrap_err();
    assert!(err.to_string().contains("login method out of range"));
  }

  #[test]
  fn test_parse_names_and_codes() {
    assert_eq!(LoginMethod::parse("user_name").unwrap(), LoginMethod::UserName);
    assert_eq!(LoginMethod::parse(" 1 ").unwrap(), LoginMethod::Certificate);
    assert_eq!(LoginMethod::parse("no_auth").unwrap(), LoginMethod::NoAuth);
    assert!(LoginMethod::parse("kerberos").is_err());
    assert!(LoginMethod::parse("-1").is_err());
  }

  #[test]
  fn test_display() {
    assert_eq!(LoginMethod::Certificate.to_string(), "certificate");
    assert_eq!(LoginMethod::UserName.description(), "user name and password");
  }
}
