use crate::{
    hdpath::KeyPath,
    metadata::EncryptedMetadata,
    types::{PaymentHash, PaymentSecret, Preimage, ShortChannelId},
};
use rusqlite::{
    types::{FromSql, FromSqlError, ToSqlOutput},
    ToSql,
};

macro_rules! impl_sql_bytes {
    ($type:ident) => {
        impl FromSql for $type {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                <[u8; 32]>::column_result(value).map($type)
            }
        }

        impl ToSql for $type {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(&self.0[..]))
            }
        }
    };
}

impl_sql_bytes!(PaymentHash);
impl_sql_bytes!(Preimage);
impl_sql_bytes!(PaymentSecret);

impl FromSql for KeyPath {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for KeyPath {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

// sqlite integers are signed so the id is stored with its bits reinterpreted
impl FromSql for ShortChannelId {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let raw = value.as_i64()?;
        ShortChannelId::from_u64(raw as u64).ok_or(FromSqlError::OutOfRange(raw))
    }
}

impl ToSql for ShortChannelId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_u64() as i64))
    }
}

impl FromSql for EncryptedMetadata {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        Ok(EncryptedMetadata::from_bytes(value.as_blob()?.to_vec()))
    }
}

impl ToSql for EncryptedMetadata {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_bytes()))
    }
}
