use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::SearchOptions;
use crate::descriptor::{Characteristics, MeshDescriptors};

/// One ranked model, lower scores are more similar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchHit {
    pub filename: String,
    pub score: f64,
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

struct Query {
    fourier: Vec<f64>,
    zernike: Vec<f64>,
}

impl Query {
    fn score(&self, other: &MeshDescriptors, opts: &SearchOptions) -> Option<f64> {
        let fourier = other.fourier_coefficients.ravel();
        let zernike = other.zernike_moments.ravel();
        if fourier.len() != self.fourier.len() || zernike.len() != self.zernike.len() {
            return None;
        }
        let fourier = euclidean(&self.fourier, &fourier);
        let zernike = euclidean(&self.zernike, &zernike);
        Some((opts.w1 * fourier + opts.w2 * zernike) / 2.0)
    }
}

/// Ranks the candidates by weighted descriptor distance to the query
///
/// Candidates without mesh descriptors or with differently sized descriptors
/// are skipped. Ties keep the candidate order.
pub fn rank<'a, I>(query: &MeshDescriptors, candidates: I, opts: &SearchOptions) -> Vec<SearchHit>
where
    I: IntoParallelIterator<Item = (&'a str, &'a Characteristics)>,
{
    let query = Query {
        fourier: query.fourier_coefficients.ravel(),
        zernike: query.zernike_moments.ravel(),
    };

    let mut hits: Vec<SearchHit> = candidates
        .into_par_iter()
        .filter_map(|(filename, characteristics)| {
            let score = characteristics.as_mesh().and_then(|mesh| query.score(mesh, opts));
            if score.is_none() {
                debug!("skipping {filename}: no comparable mesh descriptors");
            }
            Some(SearchHit { filename: filename.to_string(), score: score? })
        })
        .collect();

    hits.sort_by(|a, b| a.score.total_cmp(&b.score));
    hits.truncate(opts.top_n);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::NdArray;

    fn mesh(fourier: Vec<f64>, zernike: Vec<f64>) -> Characteristics {
        Characteristics::Mesh(Box::new(MeshDescriptors {
            num_vertices: 0,
            num_faces: 0,
            num_edges: 0,
            is_watertight: true,
            mesh_volume: 0.0,
            mesh_area: 0.0,
            mesh_bounding_box_extents: vec![],
            mesh_centroid: vec![],
            warning: None,
            fourier_coefficients: NdArray::from(fourier),
            zernike_moments: NdArray::from(zernike),
        }))
    }

    #[test]
    fn ranks_by_weighted_distance() {
        let query = mesh(vec![0.0, 0.0], vec![0.0]);
        let query = query.as_mesh().unwrap();
        let catalogue = vec![
            ("far.obj".to_string(), mesh(vec![3.0, 4.0], vec![2.0])),
            ("same.obj".to_string(), mesh(vec![0.0, 0.0], vec![0.0])),
            ("near.obj".to_string(), mesh(vec![0.0, 1.0], vec![1.0])),
        ];

        let hits = rank(
            query,
            catalogue.par_iter().map(|(name, c)| (name.as_str(), c)),
            &SearchOptions::default(),
        );

        assert_eq!(
            hits,
            vec![
                SearchHit { filename: "same.obj".into(), score: 0.0 },
                SearchHit { filename: "near.obj".into(), score: 0.5 },
                SearchHit { filename: "far.obj".into(), score: 1.75 },
            ]
        );
    }

    #[test]
    fn skips_incomparable_and_truncates() {
        let query = mesh(vec![1.0], vec![1.0]);
        let query = query.as_mesh().unwrap();
        let failed = Characteristics::Failed { error: "Empty file".into() };
        let catalogue = vec![
            ("broken.obj".to_string(), failed),
            ("longer.obj".to_string(), mesh(vec![1.0, 2.0], vec![1.0])),
            ("a.obj".to_string(), mesh(vec![1.0], vec![1.0])),
            ("b.obj".to_string(), mesh(vec![2.0], vec![1.0])),
        ];

        let opts = SearchOptions { top_n: 1, ..SearchOptions::default() };
        let hits = rank(query, catalogue.par_iter().map(|(name, c)| (name.as_str(), c)), &opts);

        assert_eq!(hits, vec![SearchHit { filename: "a.obj".into(), score: 0.0 }]);
    }

    #[test]
    fn weights_change_the_order() {
        let query = mesh(vec![0.0], vec![0.0]);
        let query = query.as_mesh().unwrap();
        let catalogue = vec![
            ("fourier_far.obj".to_string(), mesh(vec![4.0], vec![0.0])),
            ("zernike_far.obj".to_string(), mesh(vec![0.0], vec![2.0])),
        ];

        let opts = SearchOptions { top_n: 5, w1: 0.0, w2: 1.0 };
        let hits = rank(query, catalogue.par_iter().map(|(name, c)| (name.as_str(), c)), &opts);
        assert_eq!(hits[0].filename, "fourier_far.obj");
        assert_eq!(hits[1].score, 1.0);
    }
}
