use crate::TermKind;
use uuid::Uuid;

/// The fixed namespace every term UUID is derived under.
///
/// Changing this constant (or the encoding below) is a storage format break:
/// existing quad rows reference terms by these UUIDs.
pub const TERM_UUID_NAMESPACE: Uuid = Uuid::from_u128(0x6ba7b810_9dad_11d1_80b4_00c04fd430c8);

/// Derives the deterministic UUID identifying a term.
///
/// The canonical encoding joins the term's fields with NUL bytes, which cannot
/// occur inside term text: `text NUL kind [NUL "lang:"tag] [NUL "datatype:"id]`.
/// The optional fields are tagged so that an absent language can never collide
/// with a present one. The result is a v5 (name-based, SHA-1) UUID under
/// [TERM_UUID_NAMESPACE].
///
/// The function is pure and total; two processes computing the UUID for the
/// same fields always agree, which is what lets the bulk loader assign final
/// UUIDs at parse time without consulting the database.
pub fn term_uuid(
    text: &str,
    kind: TermKind,
    lang: Option<&str>,
    datatype_id: Option<i64>,
) -> Uuid {
    let mut name = Vec::with_capacity(text.len() + 24);
    name.extend_from_slice(text.as_bytes());
    name.push(0);
    name.extend_from_slice(kind.as_str().as_bytes());
    if let Some(lang) = lang {
        name.push(0);
        name.extend_from_slice(b"lang:");
        name.extend_from_slice(lang.as_bytes());
    }
    if let Some(datatype_id) = datatype_id {
        name.push(0);
        name.extend_from_slice(b"datatype:");
        name.extend_from_slice(datatype_id.to_string().as_bytes());
    }
    Uuid::new_v5(&TERM_UUID_NAMESPACE, &name)
}
