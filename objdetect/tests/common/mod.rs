//! Shared fixtures: a canonical cascade writer and synthetic windows.

#![allow(dead_code)]

use cv_objdetect::{Feature, FeatureId, HaarCascade, HaarRect, Stump, StumpStage};
use image::{GrayImage, Luma};

/// Serialize a stump-base cascade in the canonical single-space layout.
pub fn write_cascade(cascade: &HaarCascade) -> String {
    let stages = cascade.stump_stages().expect("stump-base cascade");
    let mut out = format!(
        "(hcsb {} {} {} ",
        cascade.width(),
        cascade.height(),
        stages.len()
    );
    for stage in stages {
        out.push_str(&format!("(hcs {} ", stage.stumps().len()));
        for stump in stage.stumps() {
            write_stump(&mut out, stump, &cascade.features()[stump.feature().0]);
        }
        out.push_str(&format!("{})", stage.threshold()));
    }
    out.push(')');
    out
}

fn write_stump(out: &mut String, stump: &Stump, feature: &Feature) {
    out.push_str("(hwcs (hf ");
    for r in feature.rects() {
        out.push_str(&format!(
            "(hr {} {} {} {} {})",
            r.x(),
            r.y(),
            r.width(),
            r.height(),
            r.weight()
        ));
    }
    let (a, b) = stump.values();
    let (w, h) = stump.window();
    out.push_str(&format!(
        "{}){} {} {} {} {})",
        feature.is_tilted() as i32,
        stump.threshold(),
        a,
        b,
        w,
        h
    ));
}

/// One stump over "bottom half minus top half": votes 1 when the top of the
/// window is brighter, -1 otherwise.
pub fn bright_top_cascade() -> HaarCascade {
    let feature = Feature::from_rects(&[
        HaarRect::new(0, 0, 24, 12, -1).unwrap(),
        HaarRect::new(0, 12, 24, 12, 1).unwrap(),
    ]);
    let stage = StumpStage::new(vec![Stump::new(FeatureId(0), 1000, 1, -1, 24, 24)], 1);
    HaarCascade::stump_based(24, 24, vec![feature], vec![stage]).unwrap()
}

/// `width`×`height` window with rows above `split` at `top` and the rest at
/// `bottom`.
pub fn two_level(width: u32, height: u32, split: u32, top: u8, bottom: u8) -> GrayImage {
    GrayImage::from_fn(width, height, |_, y| {
        Luma([if y < split { top } else { bottom }])
    })
}
