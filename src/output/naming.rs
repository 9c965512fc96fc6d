use sha2::{Digest, Sha256};

/// Longest encoded stem kept verbatim; longer ones are shortened and hashed
const MAX_VERBATIM_STEM: usize = 200;

/// Hex length of a SHA-256 digest
const DIGEST_HEX_LEN: usize = 64;

/// Derives the on-disk file name for an image URL
///
/// The stem is the percent-encoding of the whole URL, which is injective
/// and leaves only `[A-Za-z0-9-._~%]` in the name. Stems longer than 200
/// characters are cut to a readable prefix followed by `-` and the SHA-256
/// of the URL, giving exactly 201 characters. Verbatim stems are never that
/// long, so the two forms cannot collide with each other.
///
/// # Examples
///
/// ```
/// use catalog_harvest::output::artifact_file_name;
///
/// let name = artifact_file_name("https://cdn.example.com/p/1.jpg", "jpeg");
/// assert_eq!(name, "https%3A%2F%2Fcdn.example.com%2Fp%2F1.jpg.jpeg");
/// ```
pub fn artifact_file_name(url: &str, extension: &str) -> String {
    let encoded = urlencoding::encode(url);

    let stem = if encoded.len() <= MAX_VERBATIM_STEM {
        encoded.into_owned()
    } else {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        let prefix_len = MAX_VERBATIM_STEM - DIGEST_HEX_LEN;
        format!("{}-{}", &encoded[..prefix_len], digest)
    };

    format!("{}.{}", stem, extension)
}
