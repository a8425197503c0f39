//! Rule-based image analysis
//!
//! The image URL is split into lower-case words and matched against ordered
//! category rules; the first rule with a word starting with one of its
//! patterns picks the category bundle. Byte payloads have no URL to match and
//! always use the general bundle.

use compass_core::{
    BoundingBox, Caption, ColorInfo, DetectedObject, ImageAnalysis, ImageCategory, ImageFeature,
    ImageRequest, ImageSource, Tag,
};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

use super::seed::{confidence, seeded_rng};

/// Precomputed output material for one product category.
#[derive(Debug)]
pub struct CategoryBundle {
    pub key: &'static str,
    /// Always emitted as a tag.
    pub primary_tag: &'static str,
    pub patterns: &'static [&'static str],
    pub tags: &'static [&'static str],
    pub categories: &'static [&'static str],
    pub captions: &'static [&'static str],
    pub palette: &'static [&'static str],
    /// Name of the single simulated object.
    pub subject: &'static str,
}

/// Category rules in match order.
pub static BUNDLES: [CategoryBundle; 5] = [
    CategoryBundle {
        key: "jewelry",
        primary_tag: "jewelry",
        patterns: &["jewelry", "jewellery", "necklace", "bracelet", "ring", "earring", "pendant", "silver", "gold"],
        tags: &["necklace", "bracelet", "ring", "handmade", "silver", "gold", "precious", "elegant", "fashion"],
        categories: &["jewelry_accessories", "fashion", "handmade"],
        captions: &[
            "A beautiful handmade jewelry piece with intricate details",
            "Elegant silver jewelry with modern design",
            "Artisan crafted jewelry with precious stones",
            "Minimalist jewelry piece perfect for everyday wear",
        ],
        palette: &["#FFD700", "#C0C0C0", "#E6E6FA", "#DDA0DD", "#F0E68C"],
        subject: "jewelry",
    },
    CategoryBundle {
        key: "pet_accessories",
        primary_tag: "pet",
        patterns: &["pet", "dog", "cat", "collar", "leash", "toy"],
        tags: &["dog", "cat", "collar", "toy", "accessories", "custom", "leather", "fabric", "personalized"],
        categories: &["pet_supplies", "accessories", "handmade"],
        captions: &[
            "High-quality pet accessory designed for comfort and style",
            "Durable pet collar with custom design options",
            "Handmade pet toy using safe, non-toxic materials",
            "Personalized pet accessory with unique charm",
        ],
        palette: &["#4169E1", "#FF69B4", "#32CD32", "#FF6347", "#9370DB"],
        subject: "pet accessory",
    },
    CategoryBundle {
        key: "home_decor",
        primary_tag: "decor",
        patterns: &["decor", "home", "wall", "furniture", "vintage", "rustic"],
        tags: &["home", "wall art", "vintage", "rustic", "modern", "handmade", "wood", "ceramic", "textile"],
        categories: &["home_garden", "decor", "handmade"],
        captions: &[
            "Stylish home decor item that adds character to any room",
            "Handcrafted decorative piece with rustic charm",
            "Modern home accessory with clean lines",
            "Vintage-inspired decor perfect for contemporary homes",
        ],
        palette: &["#8FBC8F", "#F5F5DC", "#DEB887", "#D2B48C", "#BC8F8F"],
        subject: "decor item",
    },
    CategoryBundle {
        key: "art",
        primary_tag: "art",
        patterns: &["art", "print", "poster", "painting", "canvas", "illustration"],
        tags: &["print", "painting", "illustration", "poster", "abstract", "modern", "vintage", "canvas", "frame"],
        categories: &["art_collectibles", "prints", "handmade"],
        captions: &[
            "Original artwork with vibrant colors and artistic expression",
            "Limited edition print featuring contemporary design",
            "Hand-drawn illustration with intricate details",
            "Abstract art piece that captures modern aesthetics",
        ],
        palette: &["#FF7F50", "#6495ED", "#DDA0DD", "#F0E68C", "#98FB98"],
        subject: "artwork",
    },
    CategoryBundle {
        key: "crafts",
        primary_tag: "craft",
        patterns: &["craft", "diy", "knit", "fabric", "paper", "handmade"],
        tags: &["handmade", "diy", "scrapbook", "knitting", "sewing", "paper", "fabric", "supplies", "tools"],
        categories: &["crafts_supplies", "handmade", "hobby"],
        captions: &[
            "High-quality craft supplies for creative projects",
            "Handmade craft item with attention to detail",
            "DIY craft kit complete with instructions",
            "Artisan craft tool designed for precision work",
        ],
        palette: &["#FFB6C1", "#98FB98", "#F0E68C", "#DDA0DD", "#87CEEB"],
        subject: "craft item",
    },
];

/// Used when no rule matches.
pub static GENERAL: CategoryBundle = CategoryBundle {
    key: "general",
    primary_tag: "product",
    patterns: &[],
    tags: &["handmade", "item", "gift", "unique", "custom", "design", "style", "quality", "indoor"],
    categories: &["general", "handmade", "gifts"],
    captions: &[
        "A handmade product photographed on a plain background",
        "Close-up of a unique handcrafted item",
        "Product photo of a custom gift item",
        "A small-batch product with a clean presentation",
    ],
    palette: &["#FFFFFF", "#D3D3D3", "#708090", "#F5F5F5", "#B0C4DE"],
    subject: "product",
};

/// Pick the bundle for an image URL.
pub fn detect_category(url: &str) -> &'static CategoryBundle {
    let lowered = url.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    BUNDLES
        .iter()
        .find(|bundle| {
            bundle
                .patterns
                .iter()
                .any(|pattern| words.iter().any(|w| w.starts_with(pattern)))
        })
        .unwrap_or(&GENERAL)
}

/// Produce a deterministic analysis for `request`.
///
/// Every feature is generated in a fixed order from one seeded stream and the
/// unrequested ones are dropped afterwards, so toggling a feature never
/// changes the values of the others.
pub fn analyze(request: &ImageRequest) -> ImageAnalysis {
    let (bundle, mut rng) = match &request.source {
        ImageSource::Url(url) => (detect_category(url), seeded_rng(url.as_bytes())),
        ImageSource::Bytes(bytes) => (&GENERAL, seeded_rng(bytes)),
    };

    let tags = generate_tags(bundle, &mut rng);
    let captions = generate_captions(bundle, &mut rng);
    let colors = generate_colors(bundle, &mut rng);
    let categories = generate_categories(bundle, &mut rng);
    let objects = generate_objects(bundle, &mut rng);

    ImageAnalysis {
        tags: request.wants(ImageFeature::Tags).then_some(tags),
        captions: request.wants(ImageFeature::Captions).then_some(captions),
        colors: request.wants(ImageFeature::Colors).then_some(colors),
        categories: request.wants(ImageFeature::Categories).then_some(categories),
        objects: request.wants(ImageFeature::Objects).then_some(objects),
        faces: request.wants(ImageFeature::Faces).then(Vec::new),
    }
}

fn generate_tags(bundle: &CategoryBundle, rng: &mut StdRng) -> Vec<Tag> {
    let mut tags = vec![Tag {
        name: bundle.primary_tag.to_string(),
        confidence: confidence(rng, 0.85, 0.95),
    }];

    let mut pool: Vec<&str> = bundle
        .tags
        .iter()
        .copied()
        .filter(|t| *t != bundle.primary_tag)
        .collect();
    pool.shuffle(rng);
    let extra = rng.random_range(2..=6usize).min(pool.len());
    for name in pool.into_iter().take(extra) {
        tags.push(Tag {
            name: name.to_string(),
            confidence: confidence(rng, 0.6, 0.95),
        });
    }

    tags.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.name.cmp(&b.name))
    });
    tags
}

fn generate_captions(bundle: &CategoryBundle, rng: &mut StdRng) -> Vec<Caption> {
    let text = bundle.captions.choose(rng).copied().unwrap_or(bundle.subject);
    vec![Caption {
        text: text.to_string(),
        confidence: confidence(rng, 0.75, 0.95),
    }]
}

fn generate_colors(bundle: &CategoryBundle, rng: &mut StdRng) -> ColorInfo {
    let mut palette: Vec<&str> = bundle.palette.to_vec();
    palette.shuffle(rng);
    let dominant: Vec<String> = palette.iter().take(3).map(|c| c.to_string()).collect();
    // Accent comes from the colors left over after the dominant three.
    let accent = palette
        .get(3..)
        .and_then(|rest| rest.choose(rng))
        .or_else(|| palette.first())
        .map(|c| c.to_string())
        .unwrap_or_default();
    ColorInfo {
        dominant_colors: dominant,
        accent_color: accent,
    }
}

fn generate_categories(bundle: &CategoryBundle, rng: &mut StdRng) -> Vec<ImageCategory> {
    let count = rng.random_range(1..=2usize).min(bundle.categories.len());
    let mut categories: Vec<ImageCategory> = bundle
        .categories
        .iter()
        .take(count)
        .map(|name| ImageCategory {
            name: name.to_string(),
            confidence: confidence(rng, 0.7, 0.9),
        })
        .collect();
    categories.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    categories
}

fn generate_objects(bundle: &CategoryBundle, rng: &mut StdRng) -> Vec<DetectedObject> {
    let x = rng.random_range(0..200u32);
    let y = rng.random_range(0..200u32);
    let w = rng.random_range(200..600u32);
    let h = rng.random_range(200..600u32);
    vec![DetectedObject {
        name: bundle.subject.to_string(),
        confidence: confidence(rng, 0.6, 0.9),
        bounding_box: BoundingBox { x, y, w, h },
    }]
}
