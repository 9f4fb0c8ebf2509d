use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

/// A serde value stored as JSON TEXT (pin origins, meta, delegates)
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DJson<T>(pub T);

impl<T> DJson<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned> Decode<'_, Sqlite> for DJson<T> {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        let s = <&str as Decode<Sqlite>>::decode(value)?;
        Ok(Self(serde_json::from_str(s)?))
    }
}

impl<'q, T: Serialize> Encode<'q, Sqlite> for DJson<T> {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'q>>,
    ) -> Result<IsNull, BoxDynError> {
        let json = serde_json::to_string(&self.0)?;
        args.push(SqliteArgumentValue::Text(json.into()));
        Ok(IsNull::No)
    }
}

impl<T> Type<Sqlite> for DJson<T> {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }
}
