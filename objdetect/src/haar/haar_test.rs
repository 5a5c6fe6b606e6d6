use super::feature::WindowSums;
use super::weak::tree_vote;
use super::*;
use cv_imgproc::{integral_image, SummedAreaTables};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_image(rng: &mut StdRng, width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |_, _| Luma([rng.gen()]))
}

fn brute_force(img: &GrayImage, x: u32, y: u32, w: u32, h: u32, weight: i32) -> i64 {
    let mut sum = 0i64;
    for row in y..y + h {
        for col in x..x + w {
            sum += img.get_pixel(col, row)[0] as i64;
        }
    }
    sum * weight as i64
}

#[test]
fn test_haar_rectangle_sums_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..40 {
        let width = rng.gen_range(1..=64u32);
        let height = rng.gen_range(1..=64u32);
        let img = random_image(&mut rng, width, height);
        let integral = integral_image(&img);

        for _ in 0..25 {
            let x = rng.gen_range(0..width);
            let y = rng.gen_range(0..height);
            let w = rng.gen_range(0..=width - x);
            let h = rng.gen_range(0..=height - y);
            let weight = rng.gen_range(-3..=3);

            let rect = HaarRect::new(x as i32, y as i32, w as i32, h as i32, weight).unwrap();
            let offsets = rect.offsets(width as usize);
            assert_eq!(
                rect.evaluate(&offsets, integral.as_slice()),
                brute_force(&img, x, y, w, h, weight),
                "rect ({x}, {y}, {w}, {h}) in {width}x{height}"
            );
        }
    }
}

#[test]
fn test_haar_edge_rectangles_match_zero_padded_interior() {
    let mut rng = StdRng::seed_from_u64(11);
    let (width, height) = (17u32, 13u32);
    let img = random_image(&mut rng, width, height);

    let mut padded = GrayImage::new(width + 1, height + 1);
    image::imageops::replace(&mut padded, &img, 1, 1);

    let integral = integral_image(&img);
    let padded_integral = integral_image(&padded);

    for (x, y) in [(0, 0), (0, 4), (5, 0), (0, 12), (16, 0)] {
        let w = width as i32 - x;
        let h = height as i32 - y;
        let edge = HaarRect::new(x, y, w, h, 2).unwrap();
        let interior = HaarRect::new(x + 1, y + 1, w, h, 2).unwrap();
        assert_ne!(edge.kind(), RectKind::Any);
        assert_eq!(interior.kind(), RectKind::Any);

        let a = edge.evaluate(&edge.offsets(width as usize), integral.as_slice());
        let b = interior.evaluate(
            &interior.offsets(width as usize + 1),
            padded_integral.as_slice(),
        );
        assert_eq!(a, b, "edge rect at ({x}, {y})");
    }
}

fn two_feature_cascade(width: u32, height: u32) -> HaarCascade {
    let (w, h) = (width as i32, height as i32);
    let halves = Feature::from_rects(&[
        HaarRect::new(0, 0, w, h / 2, -1).unwrap(),
        HaarRect::new(0, h / 2, w, h / 2, 1).unwrap(),
    ]);
    let centre = Feature::from_rects(&[
        HaarRect::new(0, 0, w, h, 1).unwrap(),
        HaarRect::new(w / 4, h / 4, w / 2, h / 2, -4).unwrap(),
    ]);
    let stage = StumpStage::new(
        vec![
            Stump::new(FeatureId(0), 200, 1, -1, w, h),
            Stump::new(FeatureId(1), -100, -1, 1, w, h),
        ],
        0,
    );
    HaarCascade::stump_based(width, height, vec![halves, centre], vec![stage]).unwrap()
}

#[test]
fn test_haar_shared_context_follows_alternating_cascades() {
    let mut rng = StdRng::seed_from_u64(3);
    let narrow = two_feature_cascade(20, 30);
    let wide = two_feature_cascade(32, 16);
    let mut ctx = EvaluationContext::new();

    for i in 0..30 {
        let cascade = if i % 2 == 0 { &narrow } else { &wide };
        let img = random_image(&mut rng, cascade.width(), cascade.height());

        let shared = cascade.evaluate_with(&mut ctx, &img).unwrap();
        let fresh = cascade.evaluate(&img).unwrap();
        assert_eq!(shared, fresh, "iteration {i}");
        assert_eq!(ctx.width(), Some(cascade.width() as usize));
    }
    assert_eq!(ctx.stats().windows, 30);
}

#[test]
fn test_haar_stump_vote_is_monotone_in_feature_value() {
    let stump = Stump::new(FeatureId(0), 1000, -3, 7, 24, 24);
    assert_eq!(stump.modified_threshold(90 * 256), 3_240_000);

    let thresholds: Vec<i64> = (0..=127 * 256)
        .step_by(97)
        .map(|sd| stump.modified_threshold(sd))
        .collect();
    assert!(thresholds.windows(2).all(|w| w[0] <= w[1]));

    for std_dev in [0, 256, 90 * 256, 127 * 256] {
        let threshold = stump.modified_threshold(std_dev);
        let votes: Vec<i32> = (-5000..5000)
            .step_by(7)
            .map(|v| stump.vote(v, threshold))
            .collect();
        let flip = votes.iter().position(|&v| v == 7).unwrap_or(votes.len());
        assert!(votes[..flip].iter().all(|&v| v == -3));
        assert!(votes[flip..].iter().all(|&v| v == 7));
    }
}

#[test]
fn test_haar_flat_window_has_zero_threshold() {
    let stump = Stump::new(FeatureId(0), 12345, 1, 2, 24, 24);
    assert_eq!(stump.modified_threshold(0), 0);
    assert_eq!(stump.vote(0, 0), 2);
    assert_eq!(stump.vote(-1, 0), 1);
}

#[test]
fn test_haar_decision_tree_walk() {
    let features = vec![Feature::from_rects(&[HaarRect::new(0, 0, 4, 4, 1).unwrap()])];
    let offsets = vec![features[0].offsets(4)];
    let nodes = vec![
        TreeNode::new(FeatureId(0), 100, 0)
            .with_left(NodeId(1))
            .with_right(NodeId(2)),
        TreeNode::new(FeatureId(0), 0, -5),
        TreeNode::new(FeatureId(0), 0, 9),
        TreeNode::new(FeatureId(0), 100, 4).with_left(NodeId(1)),
    ];

    let dim = integral_image(&GrayImage::from_pixel(4, 4, Luma([1])));
    let bright = integral_image(&GrayImage::from_pixel(4, 4, Luma([10])));
    let dim = WindowSums::Local(dim.as_slice());
    let bright = WindowSums::Local(bright.as_slice());

    assert_eq!(tree_vote(&nodes, NodeId(0), &features, &offsets, dim), -5);
    assert_eq!(tree_vote(&nodes, NodeId(0), &features, &offsets, bright), 9);
    // right branch missing: the node's own alpha
    assert_eq!(tree_vote(&nodes, NodeId(3), &features, &offsets, bright), 4);
    assert_eq!(tree_vote(&nodes, NodeId(3), &features, &offsets, dim), -5);
}

#[test]
fn test_haar_embedded_features_match_cropped_windows() {
    let mut rng = StdRng::seed_from_u64(19);
    let (width, height) = (37u32, 29u32);
    let (win_w, win_h) = (12u32, 9u32);
    let img = random_image(&mut rng, width, height);
    let tables = SummedAreaTables::new(&img);
    let stride = tables.integral().width();

    for _ in 0..30 {
        let x = rng.gen_range(0..win_w as i32);
        let y = rng.gen_range(0..win_h as i32);
        let w = rng.gen_range(0..=win_w as i32 - x);
        let h = rng.gen_range(0..=win_h as i32 - y);
        let feature = Feature::from_rects(&[
            HaarRect::new(x, y, w, h, rng.gen_range(-4..=4)).unwrap(),
            HaarRect::new(0, 0, win_w as i32, win_h as i32, 1).unwrap(),
        ]);
        let local = feature.offsets(win_w as usize);
        let embedded = feature.embedded_offsets(stride);

        for _ in 0..10 {
            let ox = rng.gen_range(0..=width - win_w);
            let oy = rng.gen_range(0..=height - win_h);
            let window = image::imageops::crop_imm(&img, ox, oy, win_w, win_h).to_image();
            let integral = integral_image(&window);
            let sums = WindowSums::Embedded {
                integral: tables.integral().as_slice(),
                base: oy as usize * stride + ox as usize,
            };
            assert_eq!(
                sums.feature(&feature, &embedded),
                feature.evaluate(&local, integral.as_slice()),
                "rect ({x}, {y}, {w}, {h}) at ({ox}, {oy})"
            );
        }
    }
}
