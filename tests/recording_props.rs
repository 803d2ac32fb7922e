//! Property-Based Tests for the framereel recording module
//!
//! These tests verify invariants and contracts of the recording subsystem
//! using proptest for input generation and shrinking.
//!
//! Run with: cargo test --test recording_props

use proptest::prelude::*;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::tempdir;

use framereel::probe::inspect_bytes;
use framereel::recording::{
    indexed_to_rgba, normalize_quality, quantize_pixels, AviWriter, ContainerWriter, EncodedFrame,
    FrameKind, GifWriter, JpegEncoder, Palette, PaletteQuantizer, RecordingConfig,
    RecordingSession, TickOutcome, WebpWriter,
};
use framereel::testing::{synthetic_raw_frame, SolidSurface};
use framereel::timing::{avi_micros_per_frame, gif_delay_centis, webp_duration_millis};
use framereel::{ContainerFormat, RawFrame};

fn rgba_frame(width: u32, height: u32, pixels: Vec<u8>) -> RawFrame {
    RawFrame::new(width, height, pixels)
}

fn arb_frame() -> impl Strategy<Value = RawFrame> {
    (1u32..24, 1u32..24).prop_flat_map(|(w, h)| {
        prop::collection::vec(any::<u8>(), (w * h * 4) as usize)
            .prop_map(move |pixels| rgba_frame(w, h, pixels))
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// PALETTE INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    /// Every pixel maps to an entry no farther than the true nearest entry
    #[test]
    fn quantized_pixels_are_nearest(frame in arb_frame()) {
        let palette = Palette::shared_plan9();
        let indices = quantize_pixels(&frame, &palette);
        prop_assert_eq!(indices.len(), (frame.width * frame.height) as usize);

        for (i, &idx) in indices.iter().enumerate() {
            let px = &frame.pixels[i * 4..i * 4 + 3];
            let rgb = [px[0], px[1], px[2]];
            let got = framereel::recording::palette::distance_sq(palette.color(idx), rgb);
            prop_assert_eq!(got, palette.nearest_distance_sq(rgb));
        }
    }

    /// Expanding indices back is opaque and uses only palette colors
    #[test]
    fn indexed_to_rgba_is_opaque(indices in prop::collection::vec(any::<u8>(), 1..512)) {
        let palette = Palette::shared_plan9();
        let rgba = indexed_to_rgba(&indices, &palette);
        prop_assert_eq!(rgba.len(), indices.len() * 4);
        for (px, &idx) in rgba.chunks_exact(4).zip(&indices) {
            prop_assert_eq!(px[3], 255);
            prop_assert_eq!(&px[..3], &palette.color(idx)[..]);
        }
    }

    /// A frame's row stride does not change what gets quantized
    #[test]
    fn stride_padding_is_ignored(w in 1u32..16, h in 1u32..16, pad in 1usize..9, rgba in any::<[u8; 4]>()) {
        let packed = RawFrame::solid(w, h, rgba);
        let stride = w as usize * 4 + pad;
        let mut pixels = vec![0xAB; stride * h as usize];
        for y in 0..h as usize {
            pixels[y * stride..y * stride + w as usize * 4].copy_from_slice(packed.row(y as u32));
        }
        let padded = RawFrame::with_stride(w, h, stride, pixels);

        let palette = Palette::shared_plan9();
        prop_assert_eq!(quantize_pixels(&packed, &palette), quantize_pixels(&padded, &palette));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ENCODER AND TIMING INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// JPEG output is always a complete SOI..EOI stream
    #[test]
    fn jpeg_frames_are_complete(frame in arb_frame(), quality in any::<u8>()) {
        let mut encoder = JpegEncoder::new(frame.width, frame.height, quality);
        let encoded = encoder.encode(&frame).expect("valid frame encodes");
        prop_assert!(encoded.payload.starts_with(&[0xFF, 0xD8]));
        prop_assert!(encoded.payload.ends_with(&[0xFF, 0xD9]));
        prop_assert_eq!(encoded.dimensions(), (frame.width, frame.height));
    }

    /// Quality policy: 0 selects the default, everything is clamped to 1..=100
    #[test]
    fn quality_is_normalized(quality in any::<u8>()) {
        let q = normalize_quality(quality);
        prop_assert!((1..=100).contains(&q));
        if quality == 0 {
            prop_assert_eq!(q, 85);
        } else {
            prop_assert_eq!(q, quality.min(100));
        }
    }

    /// Frame intervals are truncated integer divisions
    #[test]
    fn intervals_truncate(fps in 1u32..=240) {
        prop_assert_eq!(avi_micros_per_frame(fps), 1_000_000 / fps);
        prop_assert_eq!(gif_delay_centis(fps) as u32, 100 / fps);
        prop_assert_eq!(webp_duration_millis(fps), 1000 / fps);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTAINER INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// AVI index offsets follow padded chunk sizes and inspection agrees
    #[test]
    fn avi_index_matches_chunks(frames in 0usize..12, w in 1u32..32, h in 1u32..32) {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), w, h, 30).unwrap();
        let mut encoder = JpegEncoder::new(w, h, 85);
        for i in 0..frames {
            let encoded = encoder.encode(&synthetic_raw_frame(i as u64, w, h)).unwrap();
            writer.append_frame(encoded).unwrap();
        }
        let summary = writer.finalize().unwrap();
        prop_assert_eq!(summary.frames, frames as u64);

        let index = writer.index().to_vec();
        prop_assert_eq!(index.len(), frames);
        let mut expected_offset = 4u32;
        for entry in &index {
            prop_assert_eq!(entry.offset, expected_offset);
            expected_offset += 8 + entry.size + (entry.size & 1);
        }

        let bytes = writer.into_inner().into_inner();
        prop_assert_eq!(bytes.len() as u64, summary.bytes_written);
        let info = inspect_bytes(&bytes).unwrap();
        prop_assert_eq!(info.frame_count, frames as u64);
        prop_assert_eq!(info.index_entries, Some(frames as u64));
        prop_assert!(info.finalized);
    }

    /// GIF and WebP keep every appended frame
    #[test]
    fn buffered_writers_keep_all_frames(frames in 1usize..6, w in 1u32..12, h in 1u32..12, rgba in any::<[u8; 4]>()) {
        let palette = Palette::shared_plan9();
        let mut quantizer = PaletteQuantizer::new(w, h, palette.clone());
        let frame = quantizer.quantize(&RawFrame::solid(w, h, rgba)).unwrap();

        let mut gif = GifWriter::in_memory(w, h, 30, palette.clone()).unwrap();
        let mut webp = WebpWriter::in_memory(w, h, 30).unwrap();
        for _ in 0..frames {
            gif.append_frame(frame.clone()).unwrap();
            webp.append_frame(frame.clone()).unwrap();
        }
        gif.finalize().unwrap();
        webp.finalize().unwrap();

        for bytes in [gif.output().unwrap(), webp.output().unwrap()] {
            let info = inspect_bytes(bytes).unwrap();
            prop_assert_eq!(info.frame_count, frames as u64);
            prop_assert_eq!((info.width, info.height), (w, h));
        }
    }

    /// Writers never accept frames of the other codec family
    #[test]
    fn writers_reject_wrong_kind(w in 1u32..8, h in 1u32..8) {
        let jpeg = EncodedFrame {
            payload: bytes::Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
            kind: FrameKind::Jpeg { width: w, height: h },
        };
        let indexed = EncodedFrame {
            payload: bytes::Bytes::from(vec![0u8; (w * h) as usize]),
            kind: FrameKind::Indexed { width: w, height: h, palette: Arc::new(Palette::plan9()) },
        };

        let mut avi = AviWriter::new(Cursor::new(Vec::new()), w, h, 30).unwrap();
        prop_assert!(avi.append_frame(indexed).is_err());
        let mut gif = GifWriter::in_memory(w, h, 30, Palette::shared_plan9()).unwrap();
        prop_assert!(gif.append_frame(jpeg).is_err());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSION INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Frames written = min(ticks, max_frames), and the stopping tick reads nothing
    #[test]
    fn session_respects_frame_limit(ticks in 0u32..30, limit in 0u32..15, format_idx in 0usize..3) {
        let format = [ContainerFormat::Avi, ContainerFormat::Gif, ContainerFormat::Webp][format_idx];
        let dir = tempdir().unwrap();
        let output = dir.path().join(format.default_file_name());
        let mut session = RecordingSession::new(
            RecordingConfig::for_output(&output).with_max_frames(limit),
        );
        let mut surface = SolidSurface::new(6, 4, [120, 60, 30, 255]);

        session.start(6, 4).unwrap();
        let mut auto_stopped = false;
        for _ in 0..ticks {
            match session.capture_frame(&mut surface).unwrap() {
                TickOutcome::AutoStopped(stats) => {
                    prop_assert_eq!(stats.video_frames, limit as u64);
                    auto_stopped = true;
                }
                TickOutcome::Idle => prop_assert!(auto_stopped),
                _ => {}
            }
        }
        session.stop().unwrap();

        let expected = if limit == 0 { ticks } else { ticks.min(limit) };
        prop_assert_eq!(surface.reads, expected as u64);
        if expected == 0 && format.is_indexed() {
            prop_assert!(!output.exists());
        } else {
            let info = framereel::probe::inspect_file(&output).unwrap();
            prop_assert_eq!(info.frame_count, expected as u64);
        }
        prop_assert_eq!(auto_stopped, limit > 0 && ticks > limit);
    }
}
