//! Fitting resource names into length limits.

/// Number of hex digest characters appended to a shortened name.
pub const HASH_LEN: usize = 8;

fn sha256_hex(input: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, input.as_bytes());
    data_encoding::HEXLOWER.encode(digest.as_ref())
}

/// Returns `name` if it is at most `max_len` bytes long.
///
/// Otherwise returns a prefix of `name`, a `-` and the first [`HASH_LEN`] hex
/// characters of the SHA-256 of the whole name, at most `max_len` bytes in
/// total. The same input always produces the same output, and two long names
/// sharing a prefix still differ in their suffix.
pub fn truncate_with_hash(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_owned();
    }

    let hash = sha256_hex(name);
    let suffix_len = HASH_LEN + 1;
    if max_len <= suffix_len {
        return hash[..max_len.min(HASH_LEN)].to_owned();
    }

    let mut keep = max_len - suffix_len;
    while !name.is_char_boundary(keep) {
        keep -= 1;
    }
    format!("{}-{}", &name[..keep], &hash[..HASH_LEN])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_names_are_unchanged() {
        assert_eq!("CodeBuild-main-create", truncate_with_hash("CodeBuild-main-create", 64));
        assert_eq!("exact", truncate_with_hash("exact", 5));
    }

    #[test]
    fn long_names_fit_and_are_stable() {
        let name = "Multi-LambdaCreateBranchRole-for-a-really-long-project-prefix-name";
        let short = truncate_with_hash(name, 64);
        assert_eq!(64, short.len());
        assert_eq!(short, truncate_with_hash(name, 64));
        assert!(short.starts_with("Multi-LambdaCreateBranchRole-for-a-really-long-project-"));
        let (_, hash) = short.rsplit_once('-').unwrap();
        assert_eq!(HASH_LEN, hash.len());
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn shared_prefixes_do_not_collide() {
        let base = "x".repeat(80);
        let a = truncate_with_hash(&format!("{base}-a"), 32);
        let b = truncate_with_hash(&format!("{base}-b"), 32);
        assert_ne!(a, b);
        assert_eq!(a[..23], b[..23]);
    }

    #[test]
    fn many_names_stay_distinct() {
        let names: std::collections::HashSet<String> = (0..2000)
            .map(|i| truncate_with_hash(&format!("{}-{i}", "branch".repeat(20)), 40))
            .collect();
        assert_eq!(2000, names.len());
    }

    #[test]
    fn tiny_budgets_are_respected() {
        assert_eq!(4, truncate_with_hash("abcdefghijkl", 4).len());
        assert_eq!(HASH_LEN, truncate_with_hash("abcdefghijkl", 9).len());
        assert_eq!("", truncate_with_hash("abc", 0));
    }

    #[test]
    fn multibyte_names_are_cut_on_char_boundaries() {
        let name = "ß".repeat(40);
        let short = truncate_with_hash(&name, 20);
        assert!(short.len() <= 20);
        assert!(short.starts_with("ßßßßß-"));
    }
}
