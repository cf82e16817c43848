//! 난독화 코덱 - XOR 키스트림 + base64 텍스트 인코딩
//!
//! 흐름:
//! 1. 입력 바이트 i와 키 바이트 (i mod key_len)를 XOR
//! 2. 결과 바이트 열을 base64 (STANDARD, 패딩 포함) 텍스트로 렌더링
//! 3. decode는 base64를 역변환한 뒤 동일 키스트림을 재적용 (XOR은 자기 역원)
//!
//! 가역 난독화일 뿐 암호화가 아니다. 손상된 응답도 세션이 체크섬으로
//! 판별할 수 있도록 디코딩 실패는 Err로 반환하고 호출측이 원문으로 대체한다.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// 디코딩 오류
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("base64 디코딩 실패: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("UTF-8 변환 실패: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// 반복 키 XOR 변환 (인코딩/디코딩 공용)
///
/// 키는 비어 있지 않아야 한다. Config 검증에서 보장된다.
pub fn xor_transform(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect()
}

/// 평문을 난독화하여 base64 텍스트로 인코딩
pub fn encode(plaintext: &str, key: &str) -> String {
    let obfuscated = xor_transform(plaintext.as_bytes(), key.as_bytes());
    STANDARD.encode(obfuscated)
}

/// base64 텍스트를 역변환 후 키스트림 재적용하여 평문 복원
pub fn decode(encoded: &str, key: &str) -> Result<String, DecodeError> {
    let obfuscated = STANDARD.decode(encoded)?;
    let plain = xor_transform(&obfuscated, key.as_bytes());
    Ok(String::from_utf8(plain)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_KEY;

    #[test]
    fn test_round_trip() {
        let messages = ["ping", "hello", "", "a", "조금 더 긴 유니코드 메시지 🚀"];
        for msg in messages {
            let encoded = encode(msg, DEFAULT_KEY);
            assert_eq!(decode(&encoded, DEFAULT_KEY).unwrap(), msg);
        }
    }

    #[test]
    fn test_round_trip_arbitrary_bytes() {
        // XOR 변환 자체는 임의 바이트 열에 대해 자기 역원
        let keys: [&[u8]; 3] = [b"k", b"ace6143", b"\x00\xff\x10"];
        for key in keys {
            for len in [0usize, 1, 7, 64, 1024] {
                let data: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();
                assert_eq!(xor_transform(&xor_transform(&data, key), key), data);
            }
        }
    }

    #[test]
    fn test_wire_payload_is_printable_and_distinct() {
        let encoded = encode("ping", DEFAULT_KEY);
        assert!(!encoded.is_empty());
        assert_ne!(encoded, "ping");
        assert!(encoded.bytes().all(|b| b.is_ascii()));
    }

    #[test]
    fn test_decode_malformed_is_soft_error() {
        // 손상된 응답은 Err. 호출측이 원문으로 대체해 체크섬 검사로 넘긴다
        let corrupted = "not!valid@base64~~";
        assert!(decode(corrupted, DEFAULT_KEY).is_err());
    }

    #[test]
    fn test_different_keys_differ() {
        let a = encode("same message", "ace6143");
        let b = encode("same message", "zzz9999");
        assert_ne!(a, b);
    }
}
