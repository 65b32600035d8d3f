use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use panelscan::{TextDetector, TextRegion};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const PAGE_WIDTH: u32 = 640;
pub const PAGE_HEIGHT: u32 = 480;

/// Two side-by-side panels with 4px black borders and tinted interiors
pub const TWO_PANELS: [(u32, u32, u32, u32); 2] = [(40, 40, 260, 400), (340, 40, 260, 400)];

/// Draws a white page with a bordered, filled panel at each (x, y, w, h)
pub fn draw_page(panels: &[(u32, u32, u32, u32)]) -> RgbImage {
    let mut img = RgbImage::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, Rgb([255, 255, 255]));
    for (i, &(x, y, w, h)) in panels.iter().enumerate() {
        draw_filled_rect_mut(&mut img, Rect::at(x as i32, y as i32).of_size(w, h), Rgb([0, 0, 0]));
        let tint = Rgb([200, 220 - (i as u8) * 40, 250]);
        draw_filled_rect_mut(
            &mut img,
            Rect::at(x as i32 + 4, y as i32 + 4).of_size(w - 8, h - 8),
            tint,
        );
    }
    img
}

/// Saves `img` as `dir/relative`, creating parent directories
pub fn save_page(dir: &Path, relative: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save(&path).expect("Failed to save test page");
    path
}

/// Writes a small placeholder panel image; detectors in tests never look at its pixels
pub fn write_panel(dir: &Path, name: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]))
        .save(&path)
        .expect("Failed to save test panel");
    path
}

/// Detector answering from a table keyed by file name, recording every call
#[derive(Default)]
pub struct ScriptedDetector {
    pub regions: HashMap<String, Vec<TextRegion>>,
    pub failing: Vec<String>,
    pub calls: Vec<PathBuf>,
    /// Panic (simulating a killed process) on this 1-based call
    pub panic_on_call: Option<usize>,
}

impl ScriptedDetector {
    pub fn with_text(mut self, file_name: &str, text: &str) -> Self {
        self.regions.insert(
            file_name.to_string(),
            vec![TextRegion::from_rect(10.0, 10.0, 30.0, 60.0, text, 0.9)],
        );
        self
    }

    pub fn with_regions(mut self, file_name: &str, regions: Vec<TextRegion>) -> Self {
        self.regions.insert(file_name.to_string(), regions);
        self
    }

    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.failing.push(file_name.to_string());
        self
    }

    pub fn called_for(&self, file_name: &str) -> bool {
        self.calls
            .iter()
            .any(|p| p.file_name().and_then(|n| n.to_str()) == Some(file_name))
    }
}

impl TextDetector for ScriptedDetector {
    fn detect(&mut self, image_path: &Path) -> anyhow::Result<Vec<TextRegion>> {
        self.calls.push(image_path.to_path_buf());
        if self.panic_on_call == Some(self.calls.len()) {
            panic!("simulated crash while reading {:?}", image_path);
        }

        let name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        if self.failing.contains(&name) {
            anyhow::bail!("engine could not read {}", name);
        }
        Ok(self.regions.get(&name).cloned().unwrap_or_default())
    }
}

/// Detector that answers "text" for `n` panels named panel_1.png .. panel_n.png
pub fn numbered_detector(n: usize) -> ScriptedDetector {
    (1..=n).fold(ScriptedDetector::default(), |d, i| {
        d.with_text(&format!("panel_{}.png", i), &format!("line {}", i))
    })
}
