//! The fixed row layout: one `u32` id plus two null-terminated text fields.

use crate::error::Error;

pub const USERNAME_MAX: usize = 32;
pub const EMAIL_MAX: usize = 255;

const ID_SIZE: usize = 4;
const USERNAME_SIZE: usize = USERNAME_MAX + 1;
const EMAIL_SIZE: usize = EMAIL_MAX + 1;

/// Total on-disk size of an encoded row.
pub const ROW_SIZE: usize = ID_SIZE + USERNAME_SIZE + EMAIL_SIZE;

const USERNAME_OFFSET: usize = ID_SIZE;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    pub fn new(id: u32, username: impl Into<String>, email: impl Into<String>) -> Result<Self, Error> {
        let row = Row { id, username: username.into(), email: email.into() };
        row.validate()?;
        Ok(row)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.username.len() > USERNAME_MAX {
            return Err(Error::StringTooLong {
                field: "username",
                max: USERNAME_MAX,
                got: self.username.len(),
            });
        }
        if self.email.len() > EMAIL_MAX {
            return Err(Error::StringTooLong {
                field: "email",
                max: EMAIL_MAX,
                got: self.email.len(),
            });
        }
        Ok(())
    }

    /// Encode into a `ROW_SIZE`-byte little-endian buffer.
    pub fn encode(&self) -> Result<[u8; ROW_SIZE], Error> {
        self.validate()?;
        let mut buf = [0u8; ROW_SIZE];
        buf[0..ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        write_fixed_str(&mut buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE], &self.username);
        write_fixed_str(&mut buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE], &self.email);
        Ok(buf)
    }

    /// Decode a row out of a `ROW_SIZE`-byte slice.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < ROW_SIZE {
            return Err(Error::Fatal(format!(
                "row buffer too short: expected {} bytes, got {}",
                ROW_SIZE,
                buf.len()
            )));
        }
        let id = u32::from_le_bytes(buf[0..ID_SIZE].try_into().unwrap());
        let username = read_fixed_str(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE])?;
        let email = read_fixed_str(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE])?;
        Ok(Row { id, username, email })
    }
}

fn write_fixed_str(dst: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    dst[..bytes.len()].copy_from_slice(bytes);
    dst[bytes.len()] = 0;
}

fn read_fixed_str(src: &[u8]) -> Result<String, Error> {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    std::str::from_utf8(&src[..end])
        .map(|s| s.to_string())
        .map_err(|_| Error::Fatal("row field is not valid utf-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_size_matches_layout() {
        assert_eq!(ROW_SIZE, 4 + 33 + 256);
    }

    #[test]
    fn round_trips() {
        let row = Row::new(7, "alice", "alice@example.com").unwrap();
        let encoded = row.encode().unwrap();
        let decoded = Row::decode(&encoded).unwrap();
        assert_eq!(row, decoded);
    }

    #[test]
    fn rejects_long_username() {
        let long = "a".repeat(USERNAME_MAX + 1);
        let err = Row::new(1, long, "e@x.com").unwrap_err();
        assert!(matches!(err, Error::StringTooLong { field: "username", .. }));
    }

    #[test]
    fn rejects_long_email() {
        let long = "a".repeat(EMAIL_MAX + 1);
        let err = Row::new(1, "bob", long).unwrap_err();
        assert!(matches!(err, Error::StringTooLong { field: "email", .. }));
    }

    #[test]
    fn empty_strings_round_trip() {
        let row = Row::new(0, "", "").unwrap();
        let decoded = Row::decode(&row.encode().unwrap()).unwrap();
        assert_eq!(decoded.username, "");
        assert_eq!(decoded.email, "");
    }
}
