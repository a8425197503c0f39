//! Text Analytics over Azure
//!
//! One request per feature; the results are merged into a single
//! [`TextAnalysis`]. The first failing feature fails the whole call.

use super::client::AzureClient;
use super::types::{
    DocumentsRequest, DocumentsResponse, EntitiesDocument, KeyPhrasesDocument, LanguageDocument,
    SentimentDocument,
};
use compass_core::{
    ConfidenceScores, DetectedLanguage, Entity, ProviderError, Sentiment, SentimentLabel,
    TextAnalysis, TextFeature, TextRequest,
};
use serde::de::DeserializeOwned;

const BASE_PATH: &str = "text/analytics/v3.1";

pub fn feature_path(feature: TextFeature) -> String {
    let suffix = match feature {
        TextFeature::Sentiment => "sentiment",
        TextFeature::KeyPhrases => "keyPhrases",
        TextFeature::Entities => "entities/recognition/general",
        TextFeature::Language => "languages",
    };
    format!("{}/{}", BASE_PATH, suffix)
}

/// Send one single-document batch and return that document.
async fn first_document<D: DeserializeOwned>(
    client: &AzureClient,
    feature: TextFeature,
    text: &str,
    language: Option<&str>,
) -> Result<D, ProviderError> {
    // Language detection takes no language hint.
    let language = if feature == TextFeature::Language {
        None
    } else {
        language
    };
    let body = DocumentsRequest::single(text, language);
    let response: DocumentsResponse<D> = client.post_json(&feature_path(feature), &body).await?;
    take_document(client.provider(), response)
}

pub fn take_document<D>(provider: &str, response: DocumentsResponse<D>) -> Result<D, ProviderError> {
    if let Some(err) = response.errors.into_iter().next() {
        return Err(ProviderError::UpstreamRejected {
            provider: provider.to_string(),
            status: 400,
            message: format!("{}: {}", err.error.code, err.error.message),
        });
    }
    response
        .documents
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::UpstreamInvalidResponse {
            provider: provider.to_string(),
            message: "response contained no documents".to_string(),
        })
}

pub fn parse_sentiment_label(provider: &str, raw: &str) -> Result<SentimentLabel, ProviderError> {
    match raw {
        "positive" => Ok(SentimentLabel::Positive),
        "neutral" => Ok(SentimentLabel::Neutral),
        "negative" => Ok(SentimentLabel::Negative),
        "mixed" => Ok(SentimentLabel::Mixed),
        other => Err(ProviderError::UpstreamInvalidResponse {
            provider: provider.to_string(),
            message: format!("unknown sentiment label '{}'", other),
        }),
    }
}

pub async fn analyze(
    client: &AzureClient,
    request: &TextRequest,
) -> Result<TextAnalysis, ProviderError> {
    let text = request.text.as_str();
    let language = request.language.as_deref();
    let mut out = TextAnalysis::default();

    for feature in request.features.iter().copied() {
        match feature {
            TextFeature::Sentiment => {
                let doc: SentimentDocument = first_document(client, feature, text, language).await?;
                out.sentiment = Some(Sentiment {
                    overall: parse_sentiment_label(client.provider(), &doc.sentiment)?,
                    confidence_scores: ConfidenceScores {
                        positive: doc.confidence_scores.positive,
                        neutral: doc.confidence_scores.neutral,
                        negative: doc.confidence_scores.negative,
                    },
                });
            }
            TextFeature::KeyPhrases => {
                let doc: KeyPhrasesDocument =
                    first_document(client, feature, text, language).await?;
                out.key_phrases = Some(doc.key_phrases);
            }
            TextFeature::Entities => {
                let doc: EntitiesDocument = first_document(client, feature, text, language).await?;
                out.entities = Some(
                    doc.entities
                        .into_iter()
                        .map(|e| Entity {
                            text: e.text,
                            entity_type: e.category,
                            confidence: e.confidence_score,
                        })
                        .collect(),
                );
            }
            TextFeature::Language => {
                let doc: LanguageDocument = first_document(client, feature, text, language).await?;
                out.language = Some(DetectedLanguage {
                    name: doc.detected_language.name,
                    iso6391_name: doc.detected_language.iso6391_name,
                    confidence: doc.detected_language.confidence_score,
                });
            }
        }
    }

    Ok(out)
}
