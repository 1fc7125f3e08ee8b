use std::{path::PathBuf, time::Instant};

use platesplit::{SegmentOptions, SegmenterBuilder};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

fn main() {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Some(source) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("usage: platesplit <plate image>");
        std::process::exit(2);
    };
    let image = image::open(&source).expect("Failed to load plate image");
    let segmenter = SegmenterBuilder::new()
        .build()
        .expect("Failed to build segmenter");

    let start = Instant::now();
    let segmentation = segmenter
        .extract_fallback(&image, SegmentOptions::default())
        .expect("Failed segmentation.");
    log::debug!("{:?}", start.elapsed());

    let written = segmentation
        .save_all(&PathBuf::from("segments"), &source)
        .expect("Failed to write segments");
    for path in written {
        println!("{}", path.display());
    }
}
