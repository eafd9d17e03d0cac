use std::collections::BTreeMap;

use anyhow::{Result, ensure};
use rayon::prelude::*;

use super::obj::{ObjModel, Vec3};

/// Result of [`simplify`]
#[derive(Debug, Clone)]
pub struct Simplified {
    pub model: ObjModel,
    pub collapsed_edges: usize,
}

fn distance(a: &Vec3, b: &Vec3) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

fn midpoint(a: &Vec3, b: &Vec3) -> Vec3 {
    [(a[0] + b[0]) / 2.0, (a[1] + b[1]) / 2.0, (a[2] + b[2]) / 2.0]
}

/// Unique undirected edges of the face boundaries, as `(low, high)` pairs
fn edges(model: &ObjModel) -> Vec<(usize, usize)> {
    let mut edges = BTreeMap::new();
    for face in &model.faces {
        for (i, &a) in face.iter().enumerate() {
            let b = face[(i + 1) % face.len()];
            if a != b {
                edges.insert((a.min(b), a.max(b)), ());
            }
        }
    }
    edges.into_keys().collect()
}

/// Collapses every edge not longer than `threshold`, shortest first
///
/// A collapse moves the lower vertex to the edge midpoint and merges the other
/// one into it. An edge is skipped once either endpoint took part in a collapse.
/// Faces left with fewer than three distinct vertices are dropped and vertices
/// no face refers to are removed.
pub fn simplify(model: &ObjModel, threshold: f64) -> Result<Simplified> {
    ensure!(threshold.is_finite() && threshold > 0.0, "threshold must be a positive number");

    let mut edges: Vec<_> = edges(model)
        .into_par_iter()
        .map(|(a, b)| (distance(&model.vertices[a], &model.vertices[b]), a, b))
        .filter(|(length, _, _)| *length <= threshold)
        .collect();
    edges.par_sort_by(|x, y| x.0.total_cmp(&y.0).then((x.1, x.2).cmp(&(y.1, y.2))));

    let mut vertices = model.vertices.clone();
    let mut target: Vec<usize> = (0..vertices.len()).collect();
    let mut touched = vec![false; vertices.len()];
    let mut collapsed_edges = 0;

    for (_, a, b) in edges {
        if touched[a] || touched[b] {
            continue;
        }
        vertices[a] = midpoint(&vertices[a], &vertices[b]);
        target[b] = a;
        touched[a] = true;
        touched[b] = true;
        collapsed_edges += 1;
    }

    let mut faces = vec![];
    for face in &model.faces {
        let mut remapped: Vec<usize> = vec![];
        for &v in face {
            let v = target[v];
            if remapped.last() != Some(&v) {
                remapped.push(v);
            }
        }
        while remapped.len() > 1 && remapped.first() == remapped.last() {
            remapped.pop();
        }
        let mut distinct = remapped.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() >= 3 {
            faces.push(remapped);
        }
    }

    // compact the vertex list to the ones still referenced
    let mut new_index = vec![usize::MAX; vertices.len()];
    let mut kept = vec![];
    for face in faces.iter_mut() {
        for v in face.iter_mut() {
            if new_index[*v] == usize::MAX {
                new_index[*v] = kept.len();
                kept.push(vertices[*v]);
            }
            *v = new_index[*v];
        }
    }

    let model = ObjModel {
        vertices: kept,
        texture_coords: model.texture_coords.clone(),
        normals: model.normals.clone(),
        faces,
    };
    Ok(Simplified { model, collapsed_edges })
}
