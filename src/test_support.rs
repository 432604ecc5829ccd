//! Synthetic landmark builders shared by unit tests

use crate::landmarks::{
    FaceLandmarks, HandLandmarks, Handedness, LandmarkSet, Point, FACE_MESH_POINTS_WITH_IRIS,
    HAND_POINTS,
};

const EYE_WIDTH: f64 = 0.06;

/// Place one eye's six contour points so that EAR equals `ear`
fn place_eye(points: &mut [Point], contour: [usize; 6], center: (f64, f64), ear: f64) {
    let (cx, cy) = center;
    let half_height = ear * EYE_WIDTH / 2.0;
    let [p1, p2, p3, p4, p5, p6] = contour;
    points[p1] = Point::new(cx - EYE_WIDTH / 2.0, cy);
    points[p4] = Point::new(cx + EYE_WIDTH / 2.0, cy);
    points[p2] = Point::new(cx - EYE_WIDTH / 6.0, cy - half_height);
    points[p3] = Point::new(cx + EYE_WIDTH / 6.0, cy - half_height);
    points[p6] = Point::new(cx - EYE_WIDTH / 6.0, cy + half_height);
    points[p5] = Point::new(cx + EYE_WIDTH / 6.0, cy + half_height);
}

fn place_iris(points: &mut [Point], contour: [usize; 4], center: (f64, f64)) {
    let r = 0.005;
    let (cx, cy) = center;
    points[contour[0]] = Point::new(cx + r, cy);
    points[contour[1]] = Point::new(cx, cy - r);
    points[contour[2]] = Point::new(cx - r, cy);
    points[contour[3]] = Point::new(cx, cy + r);
}

/// Face with the given mean EAR, gaze offset (|ratio - 0.5|) and nose tip.
///
/// Both eyes get the same EAR. The iris is shifted toward the outer corner
/// by `gaze_offset` of the eye width.
pub fn make_test_face(ear: f64, gaze_offset: f64, nose: (f64, f64)) -> FaceLandmarks {
    let mut points = vec![Point::new(0.5, 0.5); FACE_MESH_POINTS_WITH_IRIS];

    // Eye near 33/133: 33 is outer (smaller x), 133 inner
    place_eye(&mut points, [33, 160, 158, 133, 153, 144], (0.40, 0.40), ear);
    place_iris(
        &mut points,
        [469, 470, 471, 472],
        (0.40 - gaze_offset * EYE_WIDTH, 0.40),
    );

    // Eye near 263/362: 263 is outer (larger x), 362 inner
    place_eye(&mut points, [362, 385, 387, 263, 373, 380], (0.60, 0.40), ear);
    place_iris(
        &mut points,
        [474, 475, 476, 477],
        (0.60 + gaze_offset * EYE_WIDTH, 0.40),
    );

    points[1] = Point::new(nose.0, nose.1);
    // Chin and forehead so the bounding box covers a face-sized area
    points[152] = Point::new(0.5, 0.75);
    points[10] = Point::new(0.5, 0.20);
    points[234] = Point::new(0.30, 0.45);
    points[454] = Point::new(0.70, 0.45);

    FaceLandmarks { points }
}

/// Open-eyed face looking at the camera
pub fn make_test_landmarks() -> LandmarkSet {
    LandmarkSet {
        face: Some(make_test_face(0.30, 0.0, (0.5, 0.5))),
        ..Default::default()
    }
}

/// Hand shapes the gesture detector distinguishes
#[derive(Debug, Clone, Copy)]
pub enum TestHandShape {
    Pointing,
    OpenPalm,
    Fist,
}

/// Hand with its wrist at `wrist`, fingers pointing up the image
pub fn make_test_hand(handedness: Handedness, wrist: (f64, f64), shape: TestHandShape) -> HandLandmarks {
    let (wx, wy) = wrist;
    let mut points = vec![Point::new(wx, wy); HAND_POINTS];

    // (pip, tip, x offset) for index, middle, ring and pinky
    let fingers = [(6, 8, -0.03), (10, 12, -0.01), (14, 16, 0.01), (18, 20, 0.03)];
    for (i, (pip, tip, dx)) in fingers.into_iter().enumerate() {
        let extended = match shape {
            TestHandShape::Pointing => i == 0,
            TestHandShape::OpenPalm => true,
            TestHandShape::Fist => false,
        };
        points[pip] = Point::new(wx + dx, wy - 0.10);
        points[tip] = if extended {
            Point::new(wx + dx, wy - 0.16)
        } else {
            Point::new(wx + dx, wy - 0.07)
        };
    }

    HandLandmarks { handedness, points }
}
