use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Base64-encoded HMAC-SHA256 of `data` under `secret`. This is the signature scheme the payment gateway uses for
/// webhook calls.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC can take a key of any size");
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_vector() {
        // printf 'hello' | openssl dgst -sha256 -hmac 'key' -binary | base64
        let sig = calculate_hmac("key", b"hello");
        assert_eq!(sig, "kwezuRXvtRcf8U2MtV+8x5jGwO8UVtZt7RpqpyOli3s=");
    }

    #[test]
    fn signature_depends_on_the_secret() {
        assert_ne!(calculate_hmac("key-a", b"payload"), calculate_hmac("key-b", b"payload"));
    }
}
