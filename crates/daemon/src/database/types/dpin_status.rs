use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

use common::pins::PinStatus;

/// Pin status stored as its lowercase TEXT name
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct DPinStatus(PinStatus);

impl From<PinStatus> for DPinStatus {
    fn from(status: PinStatus) -> Self {
        Self(status)
    }
}

impl From<DPinStatus> for PinStatus {
    fn from(status: DPinStatus) -> Self {
        status.0
    }
}

impl Decode<'_, Sqlite> for DPinStatus {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        let s = <&str as Decode<Sqlite>>::decode(value)?;
        Ok(Self(s.parse()?))
    }
}

impl<'q> Encode<'q, Sqlite> for DPinStatus {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'q>>,
    ) -> Result<IsNull, BoxDynError> {
        args.push(SqliteArgumentValue::Text(self.0.as_str().into()));
        Ok(IsNull::No)
    }
}

impl Type<Sqlite> for DPinStatus {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }
}
