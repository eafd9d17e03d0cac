//! Client of the external descriptor service.
//!
//! The service receives a multipart body with every file under one field and
//! answers with `{"message": ..., "results": {"<filename>": {...}}}`, where each
//! entry holds either the computed descriptors or an `error` string.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use log::{debug, info};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{DescriptorField, ServiceOptions};
use crate::metrics;

/// Arbitrarily nested array of numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NdArray {
    Scalar(f64),
    Array(Vec<NdArray>),
}

impl NdArray {
    /// Flattens the array in row-major order
    pub fn ravel(&self) -> Vec<f64> {
        let mut out = vec![];
        self.ravel_into(&mut out);
        out
    }

    fn ravel_into(&self, out: &mut Vec<f64>) {
        match self {
            Self::Scalar(v) => out.push(*v),
            Self::Array(items) => items.iter().for_each(|item| item.ravel_into(out)),
        }
    }
}

impl From<Vec<f64>> for NdArray {
    fn from(values: Vec<f64>) -> Self {
        Self::Array(values.into_iter().map(Self::Scalar).collect())
    }
}

/// Descriptors of a 3D mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDescriptors {
    #[serde(default)]
    pub num_vertices: u64,
    #[serde(default)]
    pub num_faces: u64,
    #[serde(default)]
    pub num_edges: u64,
    #[serde(default)]
    pub is_watertight: bool,
    #[serde(default)]
    pub mesh_volume: f64,
    #[serde(default)]
    pub mesh_area: f64,
    #[serde(default)]
    pub mesh_bounding_box_extents: Vec<f64>,
    #[serde(default)]
    pub mesh_centroid: Vec<f64>,
    #[serde(default)]
    pub warning: Option<String>,
    pub fourier_coefficients: NdArray,
    pub zernike_moments: NdArray,
}

/// Descriptors of a 2D image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptors {
    pub color_histogram: Vec<Vec<f64>>,
    #[serde(default)]
    pub dominant_colors: Vec<Vec<f64>>,
    #[serde(default)]
    pub texture_descriptors: Vec<f64>,
    #[serde(default)]
    pub hu_moments: Vec<f64>,
    #[serde(default)]
    pub average_color: Vec<f64>,
    #[serde(default)]
    pub edge_histogram: Vec<f64>,
}

/// Characteristics of one file, as reported by the descriptor service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Characteristics {
    Failed { error: String },
    Mesh(Box<MeshDescriptors>),
    Image(Box<ImageDescriptors>),
    Other(Value),
}

impl Characteristics {
    pub fn as_mesh(&self) -> Option<&MeshDescriptors> {
        match self {
            Self::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DescriptorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: HashMap<String, Characteristics>,
}

/// HTTP client of the descriptor service
#[derive(Debug, Clone)]
pub struct DescriptorClient {
    client: Client,
    base_url: String,
    field: DescriptorField,
}

impl DescriptorClient {
    pub fn new(opts: &ServiceOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(opts.descriptor_timeout))
            .build()
            .context("failed to build descriptor service client")?;
        Ok(Self { client, base_url: opts.base_url(), field: opts.descriptor_field })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Computes the characteristics of every file in one request
    ///
    /// The result is keyed by the file names that were sent.
    pub async fn calculate(
        &self,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<HashMap<String, Characteristics>> {
        let count = files.len();
        let mut form = Form::new();
        for (name, contents) in files {
            form = form.part(self.field.as_str(), Part::bytes(contents).file_name(name));
        }

        let url = format!("{}/calculate-descriptors", self.base_url);
        info!("requesting descriptors of {count} file(s) from {url}");

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("failed to reach descriptor service at {url}"))?;
        metrics::observe_descriptor_duration(start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            bail!(
                "Error calculating characteristics: {}",
                status.canonical_reason().unwrap_or(status.as_str())
            );
        }

        let body: DescriptorResponse =
            response.json().await.context("invalid descriptor service response")?;
        debug!("descriptor service answered: {:?}", body.message);
        Ok(body.results)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ravel_nested_arrays() {
        let array: NdArray = serde_json::from_value(json!([[1.0, 2.0], [3.0, [4.0, 5.0]], 6])).unwrap();
        assert_eq!(array.ravel(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(NdArray::Scalar(7.0).ravel(), vec![7.0]);
    }

    #[test]
    fn characteristics_variants() {
        let failed: Characteristics = serde_json::from_value(json!({"error": "Empty file"})).unwrap();
        assert_eq!(failed.error(), Some("Empty file"));

        let mesh: Characteristics = serde_json::from_value(json!({
            "num_vertices": 8,
            "num_faces": 12,
            "num_edges": 18,
            "is_watertight": true,
            "mesh_volume": 1.0,
            "mesh_area": 6.0,
            "mesh_bounding_box_extents": [1.0, 1.0, 1.0],
            "mesh_centroid": [0.5, 0.5, 0.5],
            "warning": null,
            "fourier_coefficients": [1.0, 2.0],
            "zernike_moments": [[0.1], [0.2]],
        }))
        .unwrap();
        let mesh = mesh.as_mesh().unwrap();
        assert_eq!(mesh.num_faces, 12);
        assert_eq!(mesh.zernike_moments.ravel(), vec![0.1, 0.2]);

        let image: Characteristics = serde_json::from_value(json!({
            "color_histogram": [[1.0], [2.0], [3.0]],
            "hu_moments": [0.5],
        }))
        .unwrap();
        assert!(matches!(image, Characteristics::Image(_)));

        let other: Characteristics = serde_json::from_value(json!({"foo": 1})).unwrap();
        assert_eq!(other, Characteristics::Other(json!({"foo": 1})));
    }
}
