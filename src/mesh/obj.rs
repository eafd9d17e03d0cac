use std::fmt::Write;

use anyhow::{Context, Result, anyhow, bail};

pub type Vec3 = [f64; 3];

/// Geometry of a Wavefront OBJ file
///
/// Only positions, texture coordinates, normals and face vertex indices are kept.
/// Face indices are zero based.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjModel {
    pub vertices: Vec<Vec3>,
    pub texture_coords: Vec<[f64; 2]>,
    pub normals: Vec<Vec3>,
    pub faces: Vec<Vec<usize>>,
}

impl ObjModel {
    pub fn parse(text: &str) -> Result<Self> {
        let mut model = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            model.parse_line(line).with_context(|| format!("line {}", lineno + 1))?;
        }
        Ok(model)
    }

    fn parse_line(&mut self, line: &str) -> Result<()> {
        let line = line.split('#').next().unwrap_or_default();
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => self.vertices.push(parse_floats::<3>(parts)?),
            Some("vn") => self.normals.push(parse_floats::<3>(parts)?),
            Some("vt") => self.texture_coords.push(parse_texture_coord(parts)?),
            Some("f") => {
                let face = parts
                    .map(|token| self.resolve_index(token))
                    .collect::<Result<Vec<_>>>()?;
                if face.len() < 3 {
                    bail!("face needs at least 3 vertices, got {}", face.len());
                }
                self.faces.push(face);
            }
            _ => {}
        }
        Ok(())
    }

    /// Resolves the vertex part of `i`, `i/j`, `i//k` or `i/j/k`
    fn resolve_index(&self, token: &str) -> Result<usize> {
        let raw = token.split('/').next().unwrap_or_default();
        let index: i64 = raw.parse().with_context(|| format!("invalid face index {token:?}"))?;
        let count = self.vertices.len() as i64;
        let resolved = match index {
            i if i > 0 => i - 1,
            i if i < 0 => count + i,
            _ => bail!("face index cannot be 0"),
        };
        if resolved < 0 || resolved >= count {
            bail!("face index {index} out of range, {count} vertices defined");
        }
        Ok(resolved as usize)
    }

    pub fn to_obj_string(&self) -> String {
        let mut out = String::new();
        for [x, y, z] in &self.vertices {
            let _ = writeln!(out, "v {x} {y} {z}");
        }
        for [u, v] in &self.texture_coords {
            let _ = writeln!(out, "vt {u} {v}");
        }
        for [x, y, z] in &self.normals {
            let _ = writeln!(out, "vn {x} {y} {z}");
        }
        for face in &self.faces {
            out.push('f');
            for index in face {
                let _ = write!(out, " {}", index + 1);
            }
            out.push('\n');
        }
        out
    }
}

fn parse_float(part: &str) -> Result<f64> {
    part.parse().with_context(|| format!("invalid number {part:?}"))
}

fn parse_floats<'a, const N: usize>(mut parts: impl Iterator<Item = &'a str>) -> Result<[f64; N]> {
    let mut values = [0.0; N];
    for value in values.iter_mut() {
        let part = parts.next().ok_or_else(|| anyhow!("expected {N} coordinates"))?;
        *value = parse_float(part)?;
    }
    Ok(values)
}

/// `vt u [v [w]]`, a missing `v` is 0
fn parse_texture_coord<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<[f64; 2]> {
    let [u] = parse_floats::<1>(parts.by_ref())?;
    let v = parts.next().map(parse_float).transpose()?.unwrap_or(0.0);
    Ok([u, v])
}
