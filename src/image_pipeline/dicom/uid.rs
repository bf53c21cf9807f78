//! UID generation under the `2.25` root (UUID derived UIDs)

use uuid::Uuid;

const UUID_ROOT: &str = "2.25";

/// A fresh random UID.
pub fn generate_uid() -> String {
    uuid_to_uid(Uuid::new_v4())
}

/// A UID that is stable for the same `parent` and `name`.
pub fn derive_uid(parent: &str, name: &str) -> String {
    let seed = format!("{parent}/{name}");
    uuid_to_uid(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()))
}

fn uuid_to_uid(uuid: Uuid) -> String {
    format!("{UUID_ROOT}.{}", uuid.as_u128())
}
