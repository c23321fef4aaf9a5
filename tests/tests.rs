use rgbpalette::*;

/// Deterministic noise, so failures are reproducible
struct XorShift(u32);

impl XorShift {
    fn next(&mut self) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0
    }

    fn pixel(&mut self, colors: u32) -> RGBA {
        let c = (self.next() % colors).wrapping_mul(0x9E37_79B9);
        RGBA::new((c >> 24) as u8, (c >> 16) as u8, (c >> 8) as u8, (c & 0xFF).max(1) as u8)
    }
}

/// Noise image sent through a PNG encode/decode, like a real input would be
fn noise_png(seed: u32, width: usize, height: usize, colors: u32) -> lodepng::Bitmap<RGBA> {
    let mut rng = XorShift(seed);
    let pixels: Vec<_> = (0..width * height).map(|_| rng.pixel(colors)).collect();
    let png = lodepng::encode32(&pixels, width, height).unwrap();
    let bitmap = lodepng::decode32(&png).unwrap();
    assert_eq!(pixels, bitmap.buffer);
    bitmap
}

fn check_quantized(attr: &Attributes, image: &Image<'_>) -> Palette {
    let palette = attr.quantize(image).unwrap();
    let Palette::Quantized(q) = &palette else { panic!("{palette:?}") };

    assert!(attr.max_colors() == 0 || palette.len() <= attr.max_colors() as usize);
    assert_eq!((image.width() * image.height()) as u32, q.boxes().iter().map(|b| b.total()).sum::<u32>());
    assert_eq!(1u32 << (3 * attr.precision()), q.boxes().iter().map(|b| b.volume()).sum::<u32>());
    assert!(q.boxes().iter().all(|b| b.total() > 0));
    assert!(palette.iter().zip(palette.iter().skip(1)).all(|(a, b)| a <= b));

    let shift = 8 - attr.precision();
    for y in 0..image.height() {
        for x in 0..image.width() {
            let px = image.pixel_at(x, y);
            let i = palette.palette_index(px).unwrap();
            assert!(q.boxes()[i].contains([px.r >> shift, px.g >> shift, px.b >> shift]));
        }
    }
    palette
}

#[test]
fn exact_builders_agree() {
    let bmp = noise_png(1, 61, 37, 500);
    let attr = new();
    let img = attr.new_image_borrowed(&bmp.buffer, bmp.width, bmp.height).unwrap();

    let fancy = attr.exact_palette(&img);
    let simple = attr.exact_palette_limited(&img, usize::MAX).unwrap();
    assert_eq!(fancy.iter().collect::<Vec<_>>(), simple.iter().collect::<Vec<_>>());
    assert_eq!(fancy.iter().collect::<Vec<_>>(), attr.exact_palette(&img).iter().collect::<Vec<_>>());
    assert!(fancy.len() <= 500);
    assert!(attr.exact_palette_limited(&img, fancy.len() - 1).is_none());

    for px in &bmp.buffer {
        let i = fancy.palette_index(*px).unwrap();
        assert_eq!(Some(pack_rgb(*px)), fancy.color_at(i));
    }
}

#[test]
fn quantize_noise() {
    let bmp = noise_png(7, 100, 80, 5000);
    let mut attr = new();
    let img = attr.new_image(&bmp.buffer[..], bmp.width, bmp.height).unwrap();

    for max in [1, 2, 16, 256] {
        attr.set_max_colors(max);
        let pal = check_quantized(&attr, &img);
        assert_eq!(max as usize, pal.len());
    }

    attr.set_precision(4).unwrap();
    attr.set_max_colors(0);
    let pal = check_quantized(&attr, &img);
    assert!(pal.len() <= 1 << 12);
}

#[test]
fn quantize_is_deterministic() {
    let bmp = noise_png(99, 40, 40, 300);
    let mut attr = new();
    attr.set_max_colors(32);
    let img = attr.new_image_borrowed(&bmp.buffer, bmp.width, bmp.height).unwrap();

    let a = attr.quantize(&img).unwrap();
    let b = attr.quantize(&img).unwrap();
    assert_eq!(a.iter().collect::<Vec<_>>(), b.iter().collect::<Vec<_>>());
}

#[test]
fn stride_region() {
    let bmp = noise_png(3, 20, 10, 50);
    let attr = new();
    // left half of the image
    let region = attr.new_image_stride_borrowed(&bmp.buffer, 10, 10, 20).unwrap();
    let copy: Vec<_> = bmp.buffer.chunks(20).flat_map(|row| row[..10].iter().copied()).collect();
    let packed = attr.new_image(copy, 10, 10).unwrap();

    assert_eq!(attr.exact_palette(&region).iter().collect::<Vec<_>>(), attr.exact_palette(&packed).iter().collect::<Vec<_>>());
    assert_eq!(attr.quantize(&region).unwrap().iter().collect::<Vec<_>>(), attr.quantize(&packed).unwrap().iter().collect::<Vec<_>>());
}

#[test]
fn empty_image() {
    let attr = new();
    let img = attr.new_image(Vec::<RGBA>::new(), 0, 0).unwrap();
    assert!(attr.exact_palette(&img).is_empty());
    assert!(attr.exact_palette_limited(&img, 0).unwrap().is_empty());
    let pal = attr.quantize(&img).unwrap();
    assert!(pal.is_empty());
    assert_eq!(None, pal.palette_index(RGBA::new(1, 2, 3, 255)));
    assert_eq!(TransparentColors::None, count_transparent_colors(&img));
    assert!(is_grayscale(&img));
}

/// Sources don't have to be buffers
#[test]
fn custom_source() {
    struct Gradient;
    impl PixelSource for Gradient {
        fn width(&self) -> usize { 256 }
        fn height(&self) -> usize { 3 }
        fn pixel_at(&self, x: usize, y: usize) -> RGBA {
            let v = x as u8;
            RGBA::new(v, v, v, if y == 2 { 0 } else { 255 })
        }
        fn color_model(&self) -> ColorModel { ColorModel::Rgb }
    }

    let mut attr = new();
    assert!(is_grayscale(&Gradient));
    assert!(!attr.has_transparency(&Gradient));
    assert_eq!(TransparentColors::None, count_transparent_colors(&Gradient));
    assert_eq!(256, attr.exact_palette(&Gradient).len());
    attr.set_max_colors(8);
    let pal = attr.quantize(&Gradient).unwrap();
    assert_eq!(8, pal.len());
    assert!(pal.iter().all(|c| c >> 16 == c & 0xFF));
}
