use hog_pairdict::image::ImageF32;

/// Deterministic texture with gradients in every direction, values in [0, 1].
pub fn textured_f32(width: usize, height: usize) -> ImageF32 {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    ImageF32::from_fn(width, height, |x, y| {
        ((x * 7 + y * 13 + (x * y) / 3) % 97) as f32 / 96.0
    })
}

/// Generates a simple high-contrast checkerboard image.
pub fn checkerboard_f32(width: usize, height: usize, cell: usize) -> ImageF32 {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    assert!(cell > 0, "cell size must be positive");
    ImageF32::from_fn(width, height, |x, y| {
        if ((x / cell) + (y / cell)) & 1 == 0 {
            32.0 / 255.0
        } else {
            220.0 / 255.0
        }
    })
}
