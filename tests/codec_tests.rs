use solace::audio::codec::{decode_frame, encode_block, AudioFrame, CAPTURE_RATE_HZ};

#[test]
fn test_round_trip_within_quantization_error() {
    let original: Vec<f32> = (0..256).map(|i| (i as f32 / 256.0) * 2.0 - 1.0).collect();
    let frame = encode_block(&original, CAPTURE_RATE_HZ);
    let decoded = decode_frame(&frame.to_le_bytes(), CAPTURE_RATE_HZ, 1)
        .expect("round trip must decode");

    let samples = &decoded.channel_data[0];
    assert_eq!(samples.len(), original.len());
    for (a, b) in original.iter().zip(samples.iter()) {
        assert!(
            (a - b).abs() <= 1.0 / 32768.0 + f32::EPSILON,
            "sample {} decoded as {}",
            a,
            b
        );
    }
}

#[test]
fn test_round_trip_silence_and_full_scale() {
    let silence = vec![0.0f32; 128];
    let frame = encode_block(&silence, CAPTURE_RATE_HZ);
    assert!(frame.pcm.iter().all(|&s| s == 0));

    let loud = vec![1.0f32, -1.0];
    let frame = encode_block(&loud, CAPTURE_RATE_HZ);
    assert_eq!(frame.pcm, vec![32767, -32767]);
}

#[test]
fn test_out_of_range_clamps_never_wraps() {
    let hot = vec![1.5f32, 2.0, -1.5, -100.0];
    let frame = encode_block(&hot, CAPTURE_RATE_HZ);
    assert_eq!(frame.pcm, vec![32767, 32767, -32768, -32768]);
}

#[test]
fn test_non_finite_samples_become_silence() {
    let glitch = vec![f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 0.25];
    let frame = encode_block(&glitch, CAPTURE_RATE_HZ);
    assert_eq!(frame.pcm[0], 0);
    assert_eq!(frame.pcm[1], 0);
    assert_eq!(frame.pcm[2], 0);
    assert!(frame.pcm[3] > 0, "finite sample must survive a glitchy block");
}

#[test]
fn test_decode_rejects_partial_sample_groups() {
    let err = decode_frame(&[0u8, 1, 2], 24_000, 1).unwrap_err();
    assert_eq!(err.len, 3);
    assert_eq!(err.channels, 1);

    // Two channels need 4-byte groups.
    assert!(decode_frame(&[0u8; 6], 24_000, 2).is_err());
    assert!(decode_frame(&[0u8; 8], 24_000, 2).is_ok());
}

#[test]
fn test_decode_deinterleaves_channels() {
    // Interleaved stereo: L=1000, R=-1000, L=2000, R=-2000.
    let mut bytes = Vec::new();
    for s in [1000i16, -1000, 2000, -2000] {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    let decoded = decode_frame(&bytes, 24_000, 2).unwrap();
    assert_eq!(decoded.channel_data.len(), 2);
    assert_eq!(decoded.frame_count(), 2);
    assert!(decoded.channel_data[0].iter().all(|&s| s > 0.0));
    assert!(decoded.channel_data[1].iter().all(|&s| s < 0.0));
}

#[test]
fn test_wire_descriptor_and_duration() {
    let frame = AudioFrame {
        pcm: vec![0; 16_000],
        channels: 1,
        sample_rate: 16_000,
    };
    assert_eq!(frame.mime_type(), "audio/pcm;rate=16000");
    assert!((frame.duration_secs() - 1.0).abs() < 1e-9);
    // Base64 of 32 kB of PCM: 4 output chars per 3 input bytes.
    assert_eq!(frame.to_base64().len(), 32_000_usize.div_ceil(3) * 4);
}
