//! Local file name derivation for synchronized attachments.
//!
//! Names must be deterministic for a given remote attachment: the existence
//! check compares names only, so a name that changed between runs would
//! download the same blob twice.

use crate::attachment::AttachmentKind;
use crate::hash::ContentHash;
use time::OffsetDateTime;
use time::macros::format_description;

/// Maximum length kept from a remote file name.
const MAX_FILE_NAME_LEN: usize = 200;

/// Hex digits of the remote URI digest appended to synthesized names.
const URI_TAG_LEN: usize = 8;

/// Derive the local file name for a remote attachment.
///
/// The basename of the remote path wins when it survives sanitizing.
/// Otherwise the name is synthesized from kind, organization, the remote
/// creation timestamp and the remote URI.
pub fn derive_file_name(
    kind: AttachmentKind,
    organization_id: i64,
    remote_uri: &str,
    remote_path: Option<&str>,
    content_type: Option<&str>,
    created_at: OffsetDateTime,
) -> String {
    if let Some(name) = remote_path.and_then(sanitize_remote_name) {
        return name;
    }
    synthesize_file_name(kind, organization_id, remote_uri, content_type, created_at)
}

/// Reduce a remote path to a single safe path component.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_remote_name(remote_path: &str) -> Option<String> {
    let base = remote_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return None;
    }

    let mut out = cleaned.to_string();
    if out.len() > MAX_FILE_NAME_LEN {
        let mut cut = MAX_FILE_NAME_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    Some(out)
}

/// Build a `{label}_{org}_{YYYYMMDD_HHMMSS_mmm}_{tag}.{ext}` name.
///
/// Blobs of one submission often share a creation date, so `tag` (a short
/// digest of the remote URI) keeps their names apart.
pub fn synthesize_file_name(
    kind: AttachmentKind,
    organization_id: i64,
    remote_uri: &str,
    content_type: Option<&str>,
    created_at: OffsetDateTime,
) -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]_[subsecond digits:3]");
    let stamp = created_at
        .to_offset(time::UtcOffset::UTC)
        .format(&format)
        .unwrap_or_else(|_| created_at.unix_timestamp().to_string());

    let tag = ContentHash::compute(remote_uri.as_bytes()).to_hex();

    format!(
        "{}_{}_{}_{}.{}",
        kind.file_label(),
        organization_id,
        stamp,
        &tag[..URI_TAG_LEN],
        extension_for(kind, content_type)
    )
}

/// Pick a file extension from a MIME type, falling back to the kind default.
pub fn extension_for(kind: AttachmentKind, content_type: Option<&str>) -> &'static str {
    let default = kind.default_extension();
    let Some(essence) = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
    else {
        return default;
    };

    match mime_guess::get_mime_extensions_str(&essence.to_ascii_lowercase()) {
        Some(exts) if exts.contains(&default) => default,
        // mime_guess lists aliases alphabetically; prefer the common spelling.
        Some(exts) if exts.contains(&"jpg") => "jpg",
        Some(exts) => exts.first().copied().unwrap_or(default),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn remote_basename_is_used() {
        let name = derive_file_name(
            AttachmentKind::Photo,
            7,
            "uuid:1",
            Some("/odk/instances/uuid:1/IMG_0001.jpg"),
            Some("image/jpeg"),
            datetime!(2024-03-01 12:00 UTC),
        );
        assert_eq!(name, "IMG_0001.jpg");
    }

    #[test]
    fn traversal_and_separators_are_stripped() {
        assert_eq!(sanitize_remote_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_remote_name("C:\\fotos\\a b.png").as_deref(), Some("a_b.png"));
        assert_eq!(sanitize_remote_name("..hidden").as_deref(), Some("hidden"));
        assert_eq!(sanitize_remote_name(".."), None);
        assert_eq!(sanitize_remote_name("   "), None);
        assert_eq!(sanitize_remote_name("dir/"), None);
    }

    #[test]
    fn missing_name_is_synthesized_deterministically() {
        let created = datetime!(2023-11-05 08:09:10.123 UTC);
        let a = derive_file_name(AttachmentKind::Signature, 42, "uuid:s1", None, None, created);
        let b = derive_file_name(AttachmentKind::Signature, 42, "uuid:s1", Some(""), None, created);
        let tag = &ContentHash::compute(b"uuid:s1").to_hex()[..8];
        assert_eq!(a, format!("assinatura_42_20231105_080910_123_{tag}.png"));
        assert_eq!(a, b);
    }

    #[test]
    fn synthesized_name_uses_utc() {
        let created = datetime!(2023-11-05 05:09:10 -3);
        let name = synthesize_file_name(AttachmentKind::Photo, 1, "uuid:p", None, created);
        assert!(name.starts_with("foto_1_20231105_080910_000_"));
        assert!(name.ends_with(".jpg"));
    }

    #[test]
    fn blobs_sharing_a_timestamp_get_distinct_names() {
        let created = datetime!(2024-05-06 07:08:09.123 UTC);
        let first = synthesize_file_name(AttachmentKind::Photo, 1, "uuid:p1", None, created);
        let second = synthesize_file_name(AttachmentKind::Photo, 1, "uuid:p2", None, created);
        assert_ne!(first, second);
        assert_eq!(
            first,
            synthesize_file_name(AttachmentKind::Photo, 1, "uuid:p1", None, created)
        );
    }

    #[test]
    fn extension_follows_content_type() {
        assert_eq!(extension_for(AttachmentKind::Document, Some("application/pdf")), "pdf");
        assert_eq!(extension_for(AttachmentKind::Photo, Some("image/jpeg")), "jpg");
        assert_eq!(extension_for(AttachmentKind::Photo, Some("image/png; q=1")), "png");
        assert_eq!(extension_for(AttachmentKind::Document, Some("x-unknown/thing")), "bin");
        assert_eq!(extension_for(AttachmentKind::Signature, None), "png");
    }
}
