//! Document locking with the PDF Standard Security Handler.
//!
//! A rendered receipt is rewritten with revision 3 of the standard handler
//! (RC4, 128-bit key): an empty user password, an owner password, and a
//! permission mask that allows printing and page assembly while denying
//! modification, copying, annotation and form filling.
//!
//! ## What this does not do
//!
//! The user password is empty, so every reader derives the file key and
//! can decrypt the document. The permission bits are honoured by
//! conforming viewers and ignored by everything else. Locking is a
//! deterrent against casual editing; tamper *evidence* comes from the
//! integrity hash in the sidecar, see [`crate::integrity`].
//!
//! ## Usage
//!
//! ```no_run
//! use payment_receipts::lock::{LockPolicy, lock_document};
//! use secrecy::SecretString;
//! use std::path::Path;
//!
//! # fn example() -> payment_receipts::error::Result<()> {
//! let policy = LockPolicy::new(SecretString::new("owner123".into()));
//! lock_document(Path::new("Alice_temp.pdf"), Path::new("Alice_receipt.pdf"), &policy)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ReceiptError, Result, ResultExt as _};
use chrono::Utc;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use md5::{Digest as _, Md5};
use rc4::consts::U16;
use rc4::{KeyInit as _, Rc4, StreamCipher as _};
use secrecy::{ExposeSecret as _, SecretString};
use std::path::Path;

/// Password padding string of the standard handler.
const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

const KEY_LEN: usize = 16;
const REVISION: i64 = 3;
const MIN_VERSION: &str = "1.4";

type Key = [u8; KEY_LEN];

/// User access permissions (bit positions of the `P` entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions(u32);

impl Permissions {
    pub const PRINT: u32 = 1 << 2;
    pub const MODIFY: u32 = 1 << 3;
    pub const COPY: u32 = 1 << 4;
    pub const ANNOTATE: u32 = 1 << 5;
    pub const FILL_FORMS: u32 = 1 << 8;
    pub const EXTRACT_FOR_ACCESSIBILITY: u32 = 1 << 9;
    pub const ASSEMBLE: u32 = 1 << 10;
    pub const PRINT_HIGH_QUALITY: u32 = 1 << 11;

    /// Bits that must be set for revision 3 regardless of permissions.
    const RESERVED: u32 = 0xFFFF_F0C0;
    const GRANTABLE: u32 = 0x0F3C;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::GRANTABLE)
    }

    /// Print and assemble only.
    pub const fn receipt() -> Self {
        Self::from_bits(Self::PRINT | Self::ASSEMBLE)
    }

    pub const fn allows(self, bit: u32) -> bool {
        self.0 & bit == bit
    }

    /// Signed value written to the `P` entry.
    pub const fn p_value(self) -> i32 {
        (Self::RESERVED | self.0) as i32
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::receipt()
    }
}

/// Passwords and permissions applied to a locked document.
#[derive(Debug, Clone)]
pub struct LockPolicy {
    pub owner_password: SecretString,
    pub user_password: String,
    pub permissions: Permissions,
}

impl LockPolicy {
    /// Empty user password with receipt permissions.
    pub fn new(owner_password: SecretString) -> Self {
        Self {
            owner_password,
            user_password: String::new(),
            permissions: Permissions::receipt(),
        }
    }
}

/// First 32 bytes of the password followed by the padding string.
fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    for (dst, src) in padded.iter_mut().zip(password.iter().chain(&PASSWORD_PADDING)) {
        *dst = *src;
    }
    padded
}

fn md5_key(data: &[u8]) -> Key {
    Md5::digest(data).into()
}

fn apply_rc4(key: &Key, data: &mut [u8]) {
    Rc4::<U16>::new(key.into()).apply_keystream(data);
}

/// RC4 with `key`, then 19 more passes with `key XOR i`.
fn rc4_rounds(key: &Key, data: &mut [u8]) {
    for round in 0..20u8 {
        let mut round_key = *key;
        for b in &mut round_key {
            *b ^= round;
        }
        apply_rc4(&round_key, data);
    }
}

/// Derived values of the standard handler for one document.
struct StandardSecurity {
    file_key: Key,
    owner_entry: [u8; 32],
    user_entry: [u8; 32],
    p: i32,
}

impl StandardSecurity {
    fn new(policy: &LockPolicy, document_id: &[u8]) -> Self {
        let user = pad_password(policy.user_password.as_bytes());
        let owner_password = policy.owner_password.expose_secret();
        let owner = if owner_password.is_empty() {
            user
        } else {
            pad_password(owner_password.as_bytes())
        };
        let p = policy.permissions.p_value();

        // O entry
        let mut owner_key = md5_key(&owner);
        for _ in 0..50 {
            owner_key = md5_key(&owner_key);
        }
        let mut owner_entry = user;
        rc4_rounds(&owner_key, &mut owner_entry);

        // File key
        let mut hasher = Md5::new();
        hasher.update(user);
        hasher.update(owner_entry);
        hasher.update(p.to_le_bytes());
        hasher.update(document_id);
        let mut file_key: Key = hasher.finalize().into();
        for _ in 0..50 {
            file_key = md5_key(&file_key);
        }

        // U entry, last 16 bytes arbitrary
        let mut hasher = Md5::new();
        hasher.update(PASSWORD_PADDING);
        hasher.update(document_id);
        let mut check: Key = hasher.finalize().into();
        rc4_rounds(&file_key, &mut check);
        let mut user_entry = [0u8; 32];
        for (dst, src) in user_entry.iter_mut().zip(check) {
            *dst = src;
        }

        Self {
            file_key,
            owner_entry,
            user_entry,
            p,
        }
    }

    fn object_key(&self, (number, generation): ObjectId) -> Key {
        let mut hasher = Md5::new();
        let [n0, n1, n2, _] = number.to_le_bytes();
        hasher.update(self.file_key);
        hasher.update([n0, n1, n2]);
        hasher.update(generation.to_le_bytes());
        hasher.finalize().into()
    }

    /// Encrypt (or decrypt, RC4 is symmetric) every string and stream of `object`.
    fn crypt_object(&self, id: ObjectId, object: &mut Object) {
        if is_xref_stream(object) {
            return;
        }
        crypt_in_place(&self.object_key(id), object);
    }

    fn encrypt_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"Standard".to_vec()));
        dict.set("V", Object::Integer(2));
        dict.set("R", Object::Integer(REVISION));
        dict.set("Length", Object::Integer((KEY_LEN * 8) as i64));
        dict.set(
            "O",
            Object::String(self.owner_entry.to_vec(), StringFormat::Hexadecimal),
        );
        dict.set(
            "U",
            Object::String(self.user_entry.to_vec(), StringFormat::Hexadecimal),
        );
        dict.set("P", Object::Integer(i64::from(self.p)));
        dict
    }
}

fn crypt_in_place(key: &Key, object: &mut Object) {
    match object {
        Object::String(bytes, _) => apply_rc4(key, bytes),
        Object::Array(items) => {
            for item in items {
                crypt_in_place(key, item);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                crypt_in_place(key, value);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                crypt_in_place(key, value);
            }
            apply_rc4(key, &mut stream.content);
        }
        _ => {}
    }
}

fn is_xref_stream(object: &Object) -> bool {
    let Object::Stream(stream) = object else {
        return false;
    };
    matches!(stream.dict.get(b"Type"), Ok(Object::Name(name)) if name == b"XRef")
}

/// First element of the trailer `ID`, creating the array when absent.
fn ensure_document_id(doc: &mut Document, seed: &Path) -> Vec<u8> {
    let existing = doc
        .trailer
        .get(b"ID")
        .and_then(Object::as_array)
        .ok()
        .and_then(|ids| ids.first())
        .and_then(|first| first.as_str().ok())
        .map(<[u8]>::to_vec);
    if let Some(id) = existing {
        return id;
    }

    let id = md5_key(format!("{}{}", seed.display(), Utc::now().to_rfc3339()).as_bytes()).to_vec();
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id.clone(), StringFormat::Hexadecimal),
        ]),
    );
    id
}

/// Lock `input` into a new document at `output`.
///
/// `input` is left untouched; the caller removes it.
///
/// # Errors
///
/// Returns `InvalidPath` if `output` and `input` are the same file, or an
/// error if the document cannot be read, is already encrypted, or cannot be
/// written.
pub fn lock_document(input: &Path, output: &Path, policy: &LockPolicy) -> Result<()> {
    if input == output {
        return Err(ReceiptError::InvalidPath(format!(
            "Locked output must differ from input: {}",
            input.display()
        )));
    }

    let mut doc = Document::load(input)
        .with_context(|| format!("Failed to load document {}", input.display()))?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(ReceiptError::Pdf(format!(
            "Document is already encrypted: {}",
            input.display()
        )));
    }

    let document_id = ensure_document_id(&mut doc, output);
    let security = StandardSecurity::new(policy, &document_id);

    for (id, object) in &mut doc.objects {
        security.crypt_object(*id, object);
    }

    let encrypt_id = doc.add_object(security.encrypt_dictionary());
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    if doc.version.as_str() < MIN_VERSION {
        doc.version = MIN_VERSION.to_owned();
    }

    doc.save(output)
        .with_context(|| format!("Failed to write locked document {}", output.display()))?;

    tracing::debug!(
        objects = doc.objects.len(),
        p = security.p,
        "Locked {} -> {}",
        input.display(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};
    use std::fs;
    use tempfile::TempDir;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn sample_id() -> Vec<u8> {
        (0u8..16).collect()
    }

    fn write_sample(path: &Path) {
        let mut doc = Document::with_version("1.3");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            b"BT /F1 12 Tf 72 720 Td (Hello Receipt) Tj ET".to_vec(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Payment Receipt R001"),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.save(path).unwrap();
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_permission_value() {
        let p = Permissions::receipt();
        assert_eq!(p.p_value(), -2876);
        assert!(p.allows(Permissions::PRINT));
        assert!(p.allows(Permissions::ASSEMBLE));
        assert!(!p.allows(Permissions::MODIFY));
        assert!(!p.allows(Permissions::COPY));
        assert!(!p.allows(Permissions::ANNOTATE));
        assert!(!p.allows(Permissions::FILL_FORMS));
    }

    #[test]
    fn test_pad_password() {
        assert_eq!(pad_password(b""), PASSWORD_PADDING);
        let padded = pad_password(b"owner123");
        assert_eq!(&padded[..8], b"owner123");
        assert_eq!(&padded[8..], &PASSWORD_PADDING[..24]);
        assert_eq!(pad_password(&[b'x'; 40]), [b'x'; 32]);
    }

    #[test]
    fn test_handler_known_values() {
        let policy = LockPolicy::new(SecretString::new("owner123".into()));
        let security = StandardSecurity::new(&policy, &sample_id());

        assert_eq!(
            hex(&security.owner_entry),
            "3579de908f71f3958370af350f7239155038530b5b7210c88b7b416d9572485a"
        );
        assert_eq!(hex(&security.file_key), "4bab8a22874c6312ffa655ed4fd6af13");
        assert_eq!(
            hex(&security.user_entry[..16]),
            "9881e8dd27aa9d88668c2b0c565f59c8"
        );
        assert_eq!(
            hex(&security.object_key((7, 0))),
            "184f863389a2f58f82f5d7642263e519"
        );
    }

    #[test]
    fn test_object_encryption_round_trip() {
        let policy = LockPolicy::new(SecretString::new("owner123".into()));
        let security = StandardSecurity::new(&policy, &sample_id());

        let mut object = Object::string_literal("Hello Receipt");
        security.crypt_object((7, 0), &mut object);
        assert_eq!(hex(object.as_str().unwrap()), "bdf551cad04044a84f3f53a149");

        security.crypt_object((7, 0), &mut object);
        assert_eq!(object.as_str().unwrap(), b"Hello Receipt");
    }

    #[test]
    fn test_xref_streams_are_left_alone() {
        let policy = LockPolicy::new(SecretString::new("owner123".into()));
        let security = StandardSecurity::new(&policy, &sample_id());
        let mut object = Object::Stream(Stream::new(
            dictionary! { "Type" => "XRef" },
            b"plain".to_vec(),
        ));

        security.crypt_object((3, 0), &mut object);
        let Object::Stream(stream) = object else {
            panic!("expected stream");
        };
        assert_eq!(stream.content, b"plain");
    }

    #[test]
    fn test_lock_document() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("Alice_temp.pdf");
        let output = temp_dir.path().join("Alice_receipt.pdf");
        write_sample(&input);

        lock_document(&input, &output, &LockPolicy::new(SecretString::new("owner123".into()))).unwrap();

        let locked = fs::read(&output).unwrap();
        assert!(contains(&locked, b"/Encrypt"));
        assert!(contains(&locked, b"/Standard"));
        assert!(!contains(&locked, b"Hello Receipt"));
        assert!(!contains(&locked, b"Payment Receipt R001"));
        assert!(input.exists());
    }

    #[test]
    fn test_lock_same_path_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("receipt.pdf");
        write_sample(&path);
        let before = fs::read(&path).unwrap();

        let err = lock_document(&path, &path, &LockPolicy::new(SecretString::new("x".into()))).unwrap_err();
        assert!(matches!(err, ReceiptError::InvalidPath(_)));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_lock_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let result = lock_document(
            &temp_dir.path().join("missing.pdf"),
            &temp_dir.path().join("out.pdf"),
            &LockPolicy::new(SecretString::new("owner123".into())),
        );
        assert!(result.is_err());
        assert!(!temp_dir.path().join("out.pdf").exists());
    }
}
