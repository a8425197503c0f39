//! Computer Vision analysis over Azure

use super::client::AzureClient;
use super::types::{ImageUrlBody, VisionAnalyzeResponse};
use compass_core::{
    BoundingBox, Caption, ColorInfo, DetectedFace, DetectedObject, ImageAnalysis, ImageCategory,
    ImageFeature, ImageRequest, ImageSource, ProviderError, Tag,
};

const ANALYZE_PATH: &str = "vision/v3.2/analyze";

/// Azure `visualFeatures` value for a feature. Captions come from `Description`.
fn visual_feature(feature: ImageFeature) -> &'static str {
    match feature {
        ImageFeature::Tags => "Tags",
        ImageFeature::Captions => "Description",
        ImageFeature::Colors => "Color",
        ImageFeature::Faces => "Faces",
        ImageFeature::Objects => "Objects",
        ImageFeature::Categories => "Categories",
    }
}

pub fn analyze_path(request: &ImageRequest) -> String {
    let features: Vec<&str> = request.features.iter().map(|f| visual_feature(*f)).collect();
    format!(
        "{}?visualFeatures={}&language={}",
        ANALYZE_PATH,
        features.join(","),
        request.language
    )
}

pub async fn analyze(
    client: &AzureClient,
    request: &ImageRequest,
) -> Result<ImageAnalysis, ProviderError> {
    let path = analyze_path(request);
    let response: VisionAnalyzeResponse = match &request.source {
        ImageSource::Url(url) => client.post_json(&path, &ImageUrlBody { url }).await?,
        ImageSource::Bytes(bytes) => client.post_bytes(&path, bytes.clone()).await?,
    };
    Ok(normalize(request, response))
}

/// Map the wire response onto the canonical shape, keeping only requested features.
pub fn normalize(request: &ImageRequest, response: VisionAnalyzeResponse) -> ImageAnalysis {
    let VisionAnalyzeResponse {
        tags,
        description,
        color,
        categories,
        objects,
        faces,
    } = response;

    ImageAnalysis {
        tags: request.wants(ImageFeature::Tags).then(|| {
            tags.unwrap_or_default()
                .into_iter()
                .map(|t| Tag {
                    name: t.name,
                    confidence: t.confidence,
                })
                .collect()
        }),
        captions: request.wants(ImageFeature::Captions).then(|| {
            description
                .map(|d| d.captions)
                .unwrap_or_default()
                .into_iter()
                .map(|c| Caption {
                    text: c.text,
                    confidence: c.confidence,
                })
                .collect()
        }),
        colors: if request.wants(ImageFeature::Colors) {
            color.map(|c| ColorInfo {
                dominant_colors: c.dominant_colors,
                accent_color: c
                    .accent_color
                    .map(|hex| {
                        if hex.starts_with('#') {
                            hex
                        } else {
                            format!("#{}", hex)
                        }
                    })
                    .unwrap_or_default(),
            })
        } else {
            None
        },
        categories: request.wants(ImageFeature::Categories).then(|| {
            categories
                .unwrap_or_default()
                .into_iter()
                .map(|c| ImageCategory {
                    name: c.name,
                    confidence: c.score,
                })
                .collect()
        }),
        objects: request.wants(ImageFeature::Objects).then(|| {
            objects
                .unwrap_or_default()
                .into_iter()
                .map(|o| DetectedObject {
                    name: o.object,
                    confidence: o.confidence,
                    bounding_box: BoundingBox {
                        x: o.rectangle.x,
                        y: o.rectangle.y,
                        w: o.rectangle.w,
                        h: o.rectangle.h,
                    },
                })
                .collect()
        }),
        faces: request.wants(ImageFeature::Faces).then(|| {
            faces
                .unwrap_or_default()
                .into_iter()
                .map(|f| DetectedFace {
                    age: f.age,
                    gender: f.gender,
                    bounding_box: BoundingBox {
                        x: f.face_rectangle.left,
                        y: f.face_rectangle.top,
                        w: f.face_rectangle.width,
                        h: f.face_rectangle.height,
                    },
                })
                .collect()
        }),
    }
}
