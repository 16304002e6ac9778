/// Boosted Haar cascade loaded from OpenCV's XML training format.
///
/// Evaluation follows the classic Viola-Jones scheme: an image pyramid,
/// a sliding window per level, variance-normalised Haar features and
/// stump/tree weak classifiers summed per stage. Raw hits are clustered
/// with `group_rectangles`.
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detection::domain::cascade_classifier::{CascadeClassifier, DetectParams};
use crate::detection::domain::gray_image::GrayImage;
use crate::shared::bounding_box::BoundingBox;

use super::integral_image::IntegralImage;
use super::rect_grouping::{group_rectangles, GROUP_EPS};

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("failed to read cascade {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed cascade XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("cascade is missing <{0}>")]
    Missing(&'static str),
    #[error("invalid number {value:?} in <{element}>")]
    Number { element: &'static str, value: String },
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
}

#[derive(Debug)]
struct WeightedRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    weight: f32,
}

#[derive(Debug)]
struct HaarFeature {
    rects: Vec<WeightedRect>,
    tilted: bool,
}

impl HaarFeature {
    fn value(&self, ii: &IntegralImage, wx: usize, wy: usize) -> f64 {
        self.rects
            .iter()
            .map(|r| {
                let sum = if self.tilted {
                    ii.tilted_sum(
                        (wx + r.x as usize) as i64,
                        (wy + r.y as usize) as i64,
                        r.width as i64,
                        r.height as i64,
                    )
                } else {
                    ii.rect_sum(
                        wx + r.x as usize,
                        wy + r.y as usize,
                        r.width as usize,
                        r.height as usize,
                    )
                };
                sum as f64 * r.weight as f64
            })
            .sum()
    }
}

/// Split node; child indices `<= 0` address `leaves[-index]`.
#[derive(Debug)]
struct TreeNode {
    left: i32,
    right: i32,
    feature: usize,
    threshold: f32,
}

#[derive(Debug)]
struct WeakTree {
    nodes: Vec<TreeNode>,
    leaves: Vec<f32>,
}

#[derive(Debug)]
struct Stage {
    threshold: f32,
    trees: Vec<WeakTree>,
}

#[derive(Debug)]
pub struct HaarCascade {
    window_width: u32,
    window_height: u32,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
    has_tilted: bool,
}

impl HaarCascade {
    pub fn load(path: &Path) -> Result<Self, CascadeError> {
        let xml = std::fs::read_to_string(path).map_err(|source| CascadeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&xml)
    }

    pub fn parse(xml: &str) -> Result<Self, CascadeError> {
        let doc = roxmltree::Document::parse(xml)?;
        let cascade = doc
            .root_element()
            .children()
            .find(|n| n.has_tag_name("cascade"))
            .ok_or(CascadeError::Missing("cascade"))?;

        if let Some(kind) = child_text(cascade, "featureType") {
            if !kind.trim().eq_ignore_ascii_case("HAAR") {
                return Err(CascadeError::Unsupported(format!(
                    "feature type {}",
                    kind.trim()
                )));
            }
        }

        let window_width: u32 = parse_number(required_text(cascade, "width")?, "width")?;
        let window_height: u32 = parse_number(required_text(cascade, "height")?, "height")?;
        if window_width < 3 || window_height < 3 {
            return Err(CascadeError::Unsupported(format!(
                "window {window_width}x{window_height} is too small"
            )));
        }

        let features = required_child(cascade, "features")?
            .children()
            .filter(|n| n.is_element())
            .map(parse_feature)
            .collect::<Result<Vec<_>, _>>()?;

        let stages = required_child(cascade, "stages")?
            .children()
            .filter(|n| n.is_element())
            .map(parse_stage)
            .collect::<Result<Vec<_>, _>>()?;

        if stages.is_empty() {
            return Err(CascadeError::Missing("stages"));
        }

        let cascade = Self {
            window_width,
            window_height,
            has_tilted: features.iter().any(|f| f.tilted),
            stages,
            features,
        };
        cascade.validate()?;
        Ok(cascade)
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Node and leaf indices must stay in range so evaluation never panics.
    fn validate(&self) -> Result<(), CascadeError> {
        for (s, stage) in self.stages.iter().enumerate() {
            for tree in &stage.trees {
                if tree.nodes.is_empty() {
                    return Err(CascadeError::Unsupported(format!("stage {s} has an empty tree")));
                }
                for node in &tree.nodes {
                    if node.feature >= self.features.len() {
                        return Err(CascadeError::Unsupported(format!(
                            "stage {s} references feature {} of {}",
                            node.feature,
                            self.features.len()
                        )));
                    }
                    for child in [node.left, node.right] {
                        let valid = if child > 0 {
                            (child as usize) < tree.nodes.len()
                        } else {
                            (child.unsigned_abs() as usize) < tree.leaves.len()
                        };
                        if !valid {
                            return Err(CascadeError::Unsupported(format!(
                                "stage {s} has a dangling tree index {child}"
                            )));
                        }
                    }
                }
            }
        }
        for feature in &self.features {
            for r in &feature.rects {
                let inside = if feature.tilted {
                    r.x >= r.height
                        && r.x + r.width <= self.window_width
                        && r.y + r.width + r.height <= self.window_height
                } else {
                    r.x + r.width <= self.window_width && r.y + r.height <= self.window_height
                };
                if !inside {
                    return Err(CascadeError::Unsupported(
                        "feature rectangle leaves the window".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn evaluate_window(&self, ii: &IntegralImage, x: usize, y: usize) -> bool {
        let (cw, ch) = (self.window_width as usize, self.window_height as usize);
        let area = ((cw - 2) * (ch - 2)) as f64;
        let sum = ii.rect_sum(x + 1, y + 1, cw - 2, ch - 2) as f64;
        let sq_sum = ii.rect_sq_sum(x + 1, y + 1, cw - 2, ch - 2);
        // Flat windows keep their raw feature values.
        let variance = area * sq_sum - sum * sum;
        let norm = if variance > 0.0 { 1.0 / variance.sqrt() } else { 1.0 };

        for stage in &self.stages {
            let mut total = 0.0f64;
            for tree in &stage.trees {
                let mut idx = 0i32;
                loop {
                    let node = &tree.nodes[idx as usize];
                    let value = self.features[node.feature].value(ii, x, y) * norm;
                    idx = if value < node.threshold as f64 {
                        node.left
                    } else {
                        node.right
                    };
                    if idx <= 0 {
                        break;
                    }
                }
                total += tree.leaves[idx.unsigned_abs() as usize] as f64;
            }
            if total < stage.threshold as f64 {
                return false;
            }
        }
        true
    }
}

impl CascadeClassifier for HaarCascade {
    fn detect_multi_scale(&self, image: &GrayImage, params: &DetectParams) -> Vec<BoundingBox> {
        if params.scale_factor <= 1.0 {
            log::warn!("Ignoring cascade pass with scale factor {}", params.scale_factor);
            return Vec::new();
        }

        let (cw, ch) = (self.window_width, self.window_height);
        let mut raw = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let scaled_w = (image.width() as f64 / factor).round() as u32;
            let scaled_h = (image.height() as f64 / factor).round() as u32;
            if scaled_w < cw || scaled_h < ch {
                break;
            }

            let win_w = (cw as f64 * factor).round() as u32;
            let win_h = (ch as f64 * factor).round() as u32;
            if win_w >= params.min_size && win_h >= params.min_size {
                let level = image.resized(scaled_w, scaled_h);
                let ii = IntegralImage::new(&level, self.has_tilted);
                let step = if factor > 2.0 { 1 } else { 2 };
                for y in (0..=(scaled_h - ch) as usize).step_by(step) {
                    for x in (0..=(scaled_w - cw) as usize).step_by(step) {
                        if self.evaluate_window(&ii, x, y) {
                            raw.push(BoundingBox::new(
                                (x as f64 * factor).round() as i32,
                                (y as f64 * factor).round() as i32,
                                win_w as i32,
                                win_h as i32,
                            ));
                        }
                    }
                }
            }
            factor *= params.scale_factor;
        }

        group_rectangles(&raw, params.min_neighbors, GROUP_EPS)
    }
}

// ── XML helpers ──────────────────────────────────────────────────

fn required_child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    tag: &'static str,
) -> Result<roxmltree::Node<'a, 'input>, CascadeError> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .ok_or(CascadeError::Missing(tag))
}

fn child_text<'a>(node: roxmltree::Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children().find(|n| n.has_tag_name(tag))?.text()
}

fn required_text<'a>(node: roxmltree::Node<'a, '_>, tag: &'static str) -> Result<&'a str, CascadeError> {
    child_text(node, tag).ok_or(CascadeError::Missing(tag))
}

fn parse_number<T: std::str::FromStr>(raw: &str, element: &'static str) -> Result<T, CascadeError> {
    raw.trim().parse().map_err(|_| CascadeError::Number {
        element,
        value: raw.trim().to_string(),
    })
}

fn parse_list<T: std::str::FromStr>(raw: &str, element: &'static str) -> Result<Vec<T>, CascadeError> {
    raw.split_whitespace()
        .map(|token| parse_number(token, element))
        .collect()
}

fn parse_stage(node: roxmltree::Node) -> Result<Stage, CascadeError> {
    let threshold = parse_number(required_text(node, "stageThreshold")?, "stageThreshold")?;
    let trees = required_child(node, "weakClassifiers")?
        .children()
        .filter(|n| n.is_element())
        .map(parse_tree)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Stage { threshold, trees })
}

/// `internalNodes` holds `left right feature threshold` quadruples;
/// stumps store `0 -1 feature threshold` and two leaves.
fn parse_tree(node: roxmltree::Node) -> Result<WeakTree, CascadeError> {
    let raw: Vec<f64> = parse_list(required_text(node, "internalNodes")?, "internalNodes")?;
    if raw.is_empty() || raw.len() % 4 != 0 {
        return Err(CascadeError::Unsupported(format!(
            "internalNodes holds {} values, expected quadruples",
            raw.len()
        )));
    }
    let nodes = raw
        .chunks_exact(4)
        .map(|q| TreeNode {
            left: q[0] as i32,
            right: q[1] as i32,
            feature: q[2].max(0.0) as usize,
            threshold: q[3] as f32,
        })
        .collect();
    let leaves = parse_list(required_text(node, "leafValues")?, "leafValues")?;
    Ok(WeakTree { nodes, leaves })
}

fn parse_feature(node: roxmltree::Node) -> Result<HaarFeature, CascadeError> {
    let rects = required_child(node, "rects")?
        .children()
        .filter(|n| n.is_element())
        .map(|r| {
            let values: Vec<f64> = parse_list(r.text().unwrap_or_default(), "rects")?;
            match values.as_slice() {
                &[x, y, w, h, weight] if x >= 0.0 && y >= 0.0 && w >= 0.0 && h >= 0.0 => {
                    Ok(WeightedRect {
                        x: x as u32,
                        y: y as u32,
                        width: w as u32,
                        height: h as u32,
                        weight: weight as f32,
                    })
                }
                _ => Err(CascadeError::Unsupported(format!(
                    "feature rectangle {values:?}"
                ))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    let tilted = child_text(node, "tilted").is_some_and(|t| t.trim() != "0");
    Ok(HaarFeature { rects, tilted })
}
