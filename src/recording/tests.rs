//! Tests for the recording module

#[cfg(test)]
mod recording_tests {
    use crate::probe::inspect_file;
    use crate::recording::{RecordingConfig, RecordingSession, TickOutcome};
    use crate::testing::{GradientSurface, SolidSurface};
    use crate::types::ContainerFormat;
    use tempfile::tempdir;

    #[test]
    fn test_avi_vga_five_frames() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("vga.avi");
        let config = RecordingConfig::for_output(&output)
            .with_max_frames(5)
            .with_quality(85);
        let mut session = RecordingSession::new(config);
        let mut surface = GradientSurface::new(640, 480);

        session.start(640, 480).unwrap();
        let mut stats = None;
        for _ in 0..20 {
            if let TickOutcome::AutoStopped(s) = session.capture_frame(&mut surface).unwrap() {
                stats = Some(s);
                break;
            }
        }
        let stats = stats.expect("limit of 5 frames stops the session");
        assert_eq!(stats.video_frames, 5);

        let info = inspect_file(&output).unwrap();
        assert_eq!(info.format, ContainerFormat::Avi);
        assert_eq!((info.width, info.height), (640, 480));
        assert_eq!(info.frame_count, 5);
        assert_eq!(info.declared_frames, Some(5));
        assert_eq!(info.index_entries, Some(5));
        assert_eq!(info.frame_interval_us, 33_333);
        assert!(info.finalized);

        let interval = 1.0 / 30.0;
        assert!((info.duration_secs() - 5.0 / 30.0).abs() <= interval);
        assert!((stats.duration_secs - 5.0 / 30.0).abs() <= interval);
    }

    #[test]
    fn test_avi_vga_five_gray_frames_explicit_stop() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("gray.avi");
        let config = RecordingConfig::for_output(&output)
            .with_max_frames(5)
            .with_quality(85);
        let mut session = RecordingSession::new(config);
        let mut surface = SolidSurface::new(640, 480, [128, 128, 128, 255]);

        session.start(640, 480).unwrap();
        for _ in 0..5 {
            assert_eq!(session.capture_frame(&mut surface).unwrap(), TickOutcome::Captured);
        }
        let stats = session.stop().unwrap();
        assert_eq!(stats.video_frames, 5);

        let info = inspect_file(&output).unwrap();
        assert_eq!(info.index_entries, Some(5));
        assert_eq!(info.frame_count, 5);
        assert!(info.finalized);
        assert!((info.duration_secs() - 5.0 / 30.0).abs() <= 1.0 / 30.0);
    }

    #[test]
    fn test_frame_count_is_min_of_ticks_and_limit() {
        let dir = tempdir().unwrap();
        for (ticks, limit) in [(3u32, 10u32), (10, 10), (25, 10), (7, 0)] {
            for format in [ContainerFormat::Avi, ContainerFormat::Gif, ContainerFormat::Webp] {
                let output = dir
                    .path()
                    .join(format!("n{}_m{}.{}", ticks, limit, format.extension()));
                let mut session = RecordingSession::new(
                    RecordingConfig::for_output(&output).with_max_frames(limit),
                );
                let mut surface = SolidSurface::new(8, 8, [10, 200, 30, 255]);

                session.start(8, 8).unwrap();
                for _ in 0..ticks {
                    session.capture_frame(&mut surface).unwrap();
                }
                session.stop().unwrap();

                let expected = if limit == 0 { ticks } else { ticks.min(limit) };
                let info = inspect_file(&output).unwrap();
                assert_eq!(info.frame_count, expected as u64, "{} {} ticks limit {}", format, ticks, limit);
            }
        }
    }

    #[test]
    fn test_webp_and_gif_timing() {
        let dir = tempdir().unwrap();
        for (format, interval_us) in [(ContainerFormat::Gif, 30_000), (ContainerFormat::Webp, 33_000)] {
            let output = dir.path().join(format!("t.{}", format.extension()));
            let mut session = RecordingSession::new(RecordingConfig::for_output(&output));
            let mut surface = GradientSurface::new(10, 10);
            session.start(10, 10).unwrap();
            session.capture_frame(&mut surface).unwrap();
            session.capture_frame(&mut surface).unwrap();
            session.stop().unwrap();

            let info = inspect_file(&output).unwrap();
            assert_eq!(info.frame_interval_us, interval_us);
            assert_eq!(info.loop_count, Some(0));
        }
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let dir = tempdir().unwrap();
        let mut session = RecordingSession::new(RecordingConfig::for_output(dir.path().join("s.gif")));
        let mut surface = SolidSurface::new(4, 4, [0, 0, 0, 255]);
        session.start(4, 4).unwrap();
        session.capture_frame(&mut surface).unwrap();
        let stats = session.stop().unwrap();

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["video_frames"], 1);
        assert_eq!(json["format"], "gif");
        assert!(json["started_at"].is_string());
    }
}
