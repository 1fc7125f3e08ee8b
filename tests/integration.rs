use std::collections::HashSet;

use geo::Coord;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, point::Point, rect::Rect};
use platesplit::{
    assign::assign_contours,
    dotted::{pair_by_dotted_line, DottedPair},
    filter::{filter_heights, filter_labels},
    geometry::{merge_rects, minimum_area_rect, rects_intersect},
    output_name, Contour, LabelBox, OcrPrediction, RegionMember, RotatedRect, SegmentError,
    SegmentOptions, SegmenterBuilder,
};
use regex::Regex;

const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fill(image: &mut RgbImage, x: i32, y: i32, width: u32, height: u32) {
    draw_filled_rect_mut(image, Rect::at(x, y).of_size(width, height), BLACK);
}

fn black_pixels(image: &RgbImage) -> usize {
    image.pixels().filter(|it| **it == BLACK).count()
}

fn square(x: i32, y: i32, side: i32) -> Contour {
    Contour::new(vec![
        Point::new(x, y),
        Point::new(x + side, y),
        Point::new(x + side, y + side),
        Point::new(x, y + side),
    ])
    .unwrap()
}

#[test]
fn two_squares_without_ocr() {
    init();
    let mut image = RgbImage::from_pixel(600, 400, WHITE);
    fill(&mut image, 50, 50, 100, 100);
    fill(&mut image, 400, 50, 100, 100);
    let plate = DynamicImage::ImageRgb8(image);

    let segmenter = SegmenterBuilder::new().build().unwrap();
    let segmentation = segmenter
        .segment(&plate, &[], 2, SegmentOptions::default())
        .expect("segmentation failed");

    assert!(!segmentation.partial);
    assert_eq!(segmentation.labels(), vec!['A', 'B']);
    let (a, b) = (&segmentation.segments[0].image, &segmentation.segments[1].image);
    assert_eq!(a.dimensions(), (600, 400));
    assert_eq!(*a.get_pixel(100, 100), BLACK);
    assert_eq!(*a.get_pixel(450, 100), WHITE);
    assert_eq!(*b.get_pixel(450, 100), BLACK);
    assert_eq!(*b.get_pixel(100, 100), WHITE);
    assert_eq!(black_pixels(a), 100 * 100);
    assert_eq!(black_pixels(b), 100 * 100);

    let dir = tempfile::tempdir().unwrap();
    let written = segmentation
        .save_all(dir.path(), std::path::Path::new("scans/plate12.png"))
        .unwrap();
    let names = written
        .iter()
        .map(|it| it.file_name().unwrap().to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["plate12-A.png", "plate12-B.png"]);
    assert!(written.iter().all(|it| it.exists()));
}

#[test]
fn blobs_come_out_in_reading_order() {
    init();
    let mut image = RgbImage::from_pixel(500, 450, WHITE);
    let blobs = [(300, 250, 100), (20, 20, 60), (300, 20, 80), (20, 250, 40)];
    for (x, y, side) in blobs {
        fill(&mut image, x, y, side, side);
    }

    let segmenter = SegmenterBuilder::new().build().unwrap();
    let segmentation = segmenter
        .extract_fallback(&DynamicImage::ImageRgb8(image), SegmentOptions::default())
        .unwrap();

    assert_eq!(segmentation.labels(), vec!['A', 'B', 'C', 'D']);
    let expected = [(20, 20, 60), (300, 20, 80), (20, 250, 40), (300, 250, 100)];
    for (segment, (x, y, side)) in segmentation.segments.iter().zip(expected) {
        let center = (x as u32 + side / 2, y as u32 + side / 2);
        assert_eq!(*segment.image.get_pixel(center.0, center.1), BLACK);
        assert_eq!(black_pixels(&segment.image), (side * side) as usize);
    }
}

#[test]
fn equal_neighbours_stay_separate_unless_merging_is_enabled() {
    init();
    let mut image = RgbImage::from_pixel(500, 250, WHITE);
    for x in [50, 200, 350] {
        fill(&mut image, x, 50, 100, 100);
    }
    let image = DynamicImage::ImageRgb8(image);

    let segmenter = SegmenterBuilder::new().build().unwrap();
    let segmentation = segmenter
        .extract_fallback(&image, SegmentOptions::default())
        .unwrap();
    assert_eq!(segmentation.labels(), vec!['A', 'B', 'C']);
    for (segment, x) in segmentation.segments.iter().zip([50, 200, 350]) {
        assert_eq!(*segment.image.get_pixel(x + 50, 100), BLACK);
        assert_eq!(black_pixels(&segment.image), 100 * 100);
    }

    let merging = SegmenterBuilder::new().merge_collinear(true).build().unwrap();
    let segmentation = merging
        .extract_fallback(&image, SegmentOptions::default())
        .unwrap();
    assert_eq!(segmentation.labels(), vec!['A']);
    assert_eq!(black_pixels(&segmentation.segments[0].image), 3 * 100 * 100);
}

#[test]
fn iteration_cap_returns_partial_result() {
    init();
    let mut image = RgbImage::from_pixel(600, 400, WHITE);
    fill(&mut image, 50, 50, 100, 100);
    fill(&mut image, 400, 50, 100, 100);

    let segmenter = SegmenterBuilder::new().max_iterations(1).build().unwrap();
    let result = segmenter.extract_fallback(&DynamicImage::ImageRgb8(image), SegmentOptions::default());
    match result {
        Err(SegmentError::ExtractionIncomplete {
            iterations,
            partial,
        }) => {
            assert_eq!(iterations, 1);
            assert!(partial.partial);
            assert_eq!(partial.segments.len(), 1);
        }
        other => panic!("expected an incomplete extraction, got {other:?}"),
    }
}

fn labelled_plate() -> (RgbImage, Vec<OcrPrediction>) {
    let mut image = RgbImage::from_pixel(600, 300, WHITE);
    fill(&mut image, 50, 80, 100, 100);
    fill(&mut image, 250, 80, 100, 100);
    fill(&mut image, 450, 80, 100, 100);
    // glyphs above each square
    fill(&mut image, 90, 30, 15, 15);
    fill(&mut image, 290, 30, 15, 15);
    fill(&mut image, 490, 30, 15, 15);
    // "5 mm" written under the last square
    fill(&mut image, 470, 220, 30, 10);

    let predictions = vec![
        OcrPrediction::from_rect("C", 490.0, 30.0, 15.0, 15.0),
        OcrPrediction::from_rect("A", 90.0, 30.0, 15.0, 15.0),
        OcrPrediction::from_rect("b", 290.0, 30.0, 15.0, 15.0),
        OcrPrediction::from_rect("5", 470.0, 220.0, 8.0, 10.0),
        OcrPrediction::from_rect("mm", 482.0, 220.0, 18.0, 10.0),
    ];
    (image, predictions)
}

#[test]
fn labelled_plate_splits_by_nearest_label() {
    init();
    let (image, predictions) = labelled_plate();
    let segmenter = SegmenterBuilder::new().strict(true).build().unwrap();
    let segmentation = segmenter
        .segment(
            &DynamicImage::ImageRgb8(image),
            &predictions,
            3,
            SegmentOptions::default(),
        )
        .unwrap();

    assert_eq!(segmentation.labels(), vec!['A', 'B', 'C']);
    let [a, b, c] = [0, 1, 2].map(|i| &segmentation.segments[i].image);

    assert_eq!(*a.get_pixel(100, 130), BLACK);
    assert_eq!(*a.get_pixel(95, 35), BLACK);
    assert_eq!(*a.get_pixel(300, 130), WHITE);
    assert_eq!(*a.get_pixel(480, 225), WHITE);

    assert_eq!(*b.get_pixel(300, 130), BLACK);
    assert_eq!(*b.get_pixel(295, 35), BLACK);
    assert_eq!(*b.get_pixel(100, 130), WHITE);

    assert_eq!(*c.get_pixel(500, 130), BLACK);
    assert_eq!(*c.get_pixel(480, 225), BLACK);
    assert_eq!(*c.get_pixel(300, 130), WHITE);
}

#[test]
fn dotted_line_pulls_callout_into_its_label() {
    init();
    let mut image = RgbImage::from_pixel(700, 400, WHITE);
    fill(&mut image, 50, 100, 150, 150);
    fill(&mut image, 450, 100, 150, 150);
    fill(&mut image, 300, 300, 40, 40);
    fill(&mut image, 100, 60, 15, 15);
    fill(&mut image, 500, 60, 15, 15);
    for step in 0..12 {
        let at = 206 + 7 * step;
        fill(&mut image, at, at, 4, 4);
    }
    let predictions = vec![
        OcrPrediction::from_rect("A", 100.0, 60.0, 15.0, 15.0),
        OcrPrediction::from_rect("B", 500.0, 60.0, 15.0, 15.0),
    ];

    let segmenter = SegmenterBuilder::new().build().unwrap();
    let segmentation = segmenter
        .segment(
            &DynamicImage::ImageRgb8(image),
            &predictions,
            2,
            SegmentOptions::default(),
        )
        .unwrap();

    let (a, b) = (&segmentation.segments[0].image, &segmentation.segments[1].image);
    assert_eq!(*a.get_pixel(120, 170), BLACK);
    assert_eq!(*a.get_pixel(320, 320), BLACK);
    assert_eq!(*b.get_pixel(320, 320), WHITE);
    assert_eq!(*b.get_pixel(520, 170), BLACK);
}

#[test]
fn ocr_failure_is_reported() {
    init();
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, WHITE));
    let recognizer = |_: &DynamicImage| -> Result<Vec<OcrPrediction>, platesplit::BoxError> {
        Err("engine crashed".into())
    };
    let segmenter = SegmenterBuilder::new().build().unwrap();
    let result = segmenter.segment_with(&recognizer, &image, 1, SegmentOptions::default());
    assert!(matches!(result, Err(SegmentError::Ocr(_))));
}

#[test]
fn strict_mode_rejects_missing_labels() {
    init();
    let (image, mut predictions) = labelled_plate();
    predictions.retain(|it| it.text != "C");
    let plate = DynamicImage::ImageRgb8(image);

    let strict = SegmenterBuilder::new().strict(true).build().unwrap();
    let result = strict.segment(&plate, &predictions, 3, SegmentOptions::default());
    assert!(matches!(
        result,
        Err(SegmentError::LabelCount {
            expected: 3,
            found: 2
        })
    ));

    let lenient = SegmenterBuilder::new().build().unwrap();
    let segmentation = lenient
        .segment(&plate, &predictions, 3, SegmentOptions::default())
        .unwrap();
    assert_eq!(segmentation.labels(), vec!['A', 'B', 'C']);
    assert!(segmentation.segments[2]
        .image
        .pixels()
        .all(|it| *it == WHITE));
}

#[test]
fn label_filter_skips_units_and_pads() {
    let predictions = vec![
        OcrPrediction::from_rect("cm", 0.0, 0.0, 10.0, 10.0),
        OcrPrediction::from_rect("Bs", 50.0, 0.0, 10.0, 10.0),
        OcrPrediction::from_rect("A", 20.0, 0.0, 10.0, 10.0),
        OcrPrediction::from_rect("D", 80.0, 0.0, 10.0, 10.0),
        OcrPrediction::from_rect("12", 80.0, 40.0, 10.0, 10.0),
    ];
    let labels = filter_labels(&predictions, &['A', 'B', 'C'], 10.0, false).unwrap();
    assert_eq!(
        labels.iter().map(|it| it.label).collect::<Vec<_>>(),
        vec!['A', 'B']
    );
    assert_eq!(labels[0].quad[2], Coord { x: 40.0, y: 20.0 });

    let err = filter_labels(&predictions, &['A', 'B', 'C'], 10.0, true).unwrap_err();
    assert!(matches!(err, SegmentError::LabelCount { expected: 3, found: 2 }));
}

#[test]
fn duplicate_label_does_not_stand_in_for_a_missing_one() {
    let predictions = vec![
        OcrPrediction::from_rect("A", 0.0, 0.0, 10.0, 10.0),
        OcrPrediction::from_rect("A", 50.0, 0.0, 10.0, 10.0),
    ];
    let err = filter_labels(&predictions, &['A', 'B'], 10.0, true).unwrap_err();
    assert!(matches!(err, SegmentError::LabelCount { expected: 2, found: 1 }));

    let labels = filter_labels(&predictions, &['A', 'B'], 10.0, false).unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].quad[0], Coord { x: 0.0, y: 0.0 });
}

#[test]
fn digits_join_their_nearest_unit() {
    let predictions = vec![
        OcrPrediction::from_rect("5", 100.0, 100.0, 10.0, 10.0),
        OcrPrediction::from_rect("10", 400.0, 100.0, 10.0, 10.0),
        OcrPrediction::from_rect("mm", 115.0, 100.0, 20.0, 10.0),
        OcrPrediction::from_rect("cm", 800.0, 100.0, 20.0, 10.0),
    ];
    let heights = filter_heights(&predictions, &Regex::new("[cm]m").unwrap(), 100.0);
    assert_eq!(heights.len(), 2);
    assert_eq!(heights[0].text, "5 mm");
    assert_eq!(heights[0].quad[0], Coord { x: 100.0, y: 100.0 });
    assert_eq!(heights[0].quad[2], Coord { x: 135.0, y: 110.0 });
    assert_eq!(heights[1].text, "cm");
}

#[test]
fn every_contour_gets_exactly_one_label() {
    let contours = vec![square(0, 100, 50), square(200, 100, 50), square(400, 100, 50)];
    let label_boxes = ['C', 'A', 'B']
        .into_iter()
        .zip([400.0, 0.0, 200.0])
        .map(|(label, x)| LabelBox {
            label,
            quad: OcrPrediction::from_rect("", x, 60.0, 20.0, 20.0).quad,
        })
        .collect::<Vec<_>>();

    let regions = assign_contours(&contours, &label_boxes, &[]);
    assert_eq!(regions.len(), 3);
    let owned = [('A', 0), ('B', 1), ('C', 2)];
    let mut seen = HashSet::new();
    for (label, index) in owned {
        let region = &regions[&label];
        let indices = region.contour_indices().collect::<Vec<_>>();
        assert_eq!(indices, vec![index]);
        assert!(seen.insert(index));
        let boxes = region
            .members
            .iter()
            .filter(|it| matches!(it, RegionMember::LabelBox(_)))
            .count();
        assert_eq!(boxes, 1);
    }
}

#[test]
fn dotted_pair_follows_main_contour() {
    let contours = vec![square(0, 0, 10), square(100, 0, 4)];
    let line = square(40, 3, 3);
    let pairs = pair_by_dotted_line(&contours, &[line]);
    assert_eq!(pairs, vec![DottedPair { main: 0, sub: 1 }]);

    let label_boxes = vec![
        LabelBox {
            label: 'A',
            quad: OcrPrediction::from_rect("", 0.0, -20.0, 5.0, 5.0).quad,
        },
        LabelBox {
            label: 'B',
            quad: OcrPrediction::from_rect("", 110.0, 20.0, 5.0, 5.0).quad,
        },
    ];
    let regions = assign_contours(&contours, &label_boxes, &pairs);
    assert_eq!(regions[&'A'].contour_indices().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(regions[&'B'].contour_indices().count(), 0);
}

#[test]
fn merged_rect_matches_rect_of_all_corners() {
    let rects = [
        RotatedRect::new(Coord { x: 20.0, y: 20.0 }, (30.0, 10.0), 15.0),
        RotatedRect::new(Coord { x: 70.0, y: 35.0 }, (20.0, 20.0), 60.0),
        RotatedRect::new(Coord { x: 40.0, y: 80.0 }, (12.0, 40.0), 0.0),
    ];
    let merged = merge_rects(&rects).unwrap();
    let corners = rects.iter().flat_map(|it| it.corners()).collect::<Vec<_>>();
    let direct = minimum_area_rect(&corners).unwrap();
    assert_eq!(merged, direct);
    assert!(merged.area() >= rects.iter().map(RotatedRect::area).fold(0.0, f32::max));
}

#[test]
fn intersection_is_one_sided() {
    let outer = RotatedRect::new(Coord { x: 50.0, y: 50.0 }, (100.0, 100.0), 0.0).corners();
    let inner = RotatedRect::new(Coord { x: 50.0, y: 50.0 }, (10.0, 10.0), 0.0).corners();
    let poking = RotatedRect::new(Coord { x: 110.0, y: 110.0 }, (30.0, 30.0), 0.0).corners();
    let apart = RotatedRect::new(Coord { x: 300.0, y: 300.0 }, (10.0, 10.0), 0.0).corners();

    assert!(!rects_intersect(&inner, &outer));
    assert!(rects_intersect(&outer, &inner));
    assert!(rects_intersect(&outer, &poking));
    assert!(!rects_intersect(&outer, &apart));
}

#[test]
fn output_names_use_upper_case_labels() {
    assert_eq!(output_name("fig3", 'b', "jpg"), "fig3-B.jpg");
}
