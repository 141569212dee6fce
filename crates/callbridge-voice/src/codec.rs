//! G.711 μ-law loudness estimation for telephone audio frames.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const MULAW_BIAS: i32 = 0x84;

/// Decodes one G.711 μ-law byte to a 16-bit linear sample.
pub fn mulaw_to_linear(byte: u8) -> i16 {
    let u = !byte;
    let exponent = (u >> 4) & 0x07;
    let mantissa = (u & 0x0F) as i32;
    let magnitude = (((mantissa << 3) + MULAW_BIAS) << exponent) - MULAW_BIAS;
    if u & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Root-mean-square loudness of a μ-law buffer, decoding every other sample.
///
/// Empty input yields `0.0`.
pub fn mulaw_rms(encoded: &[u8]) -> f64 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for &byte in encoded.iter().step_by(2) {
        let sample = mulaw_to_linear(byte) as f64;
        sum += sample * sample;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt()
}

/// Loudness of a base64-encoded μ-law payload. Malformed base64 yields `0.0`.
pub fn payload_loudness(payload_b64: &str) -> f64 {
    match STANDARD.decode(payload_b64) {
        Ok(bytes) => mulaw_rms(&bytes),
        Err(_) => 0.0,
    }
}
