pub mod image_helper {
    use image::ImageEncoder;
    use std::path::Path;

    /// Writes a raw RGBA8 buffer to `path` as PNG.
    pub fn save<P: AsRef<Path>>(
        path: P,
        width: u32,
        height: u32,
        buffer: &[u8],
    ) -> Result<(), image::error::ImageError> {
        let output = std::io::BufWriter::new(std::fs::File::create(path)?);
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(buffer, width, height, image::ExtendedColorType::Rgba8)?;

        Ok(())
    }

    /// Blends `color` onto the pixel at (x, y) using the color's alpha. Out of bounds is ignored.
    pub fn blend_pixel(canvas: &mut image::RgbaImage, x: i64, y: i64, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= canvas.width() as i64 || y >= canvas.height() as i64 {
            return;
        }
        let pixel = canvas.get_pixel_mut(x as u32, y as u32);
        let alpha = color[3] as u32;
        for channel in 0..3 {
            let under = pixel.0[channel] as u32;
            pixel.0[channel] = ((color[channel] as u32 * alpha + under * (255 - alpha)) / 255) as u8;
        }
        pixel.0[3] = pixel.0[3].max(color[3]);
    }
}
