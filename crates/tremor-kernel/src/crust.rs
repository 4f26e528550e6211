//! Layered medium.
//!
//! A `CrustModel` is immutable once built and is shared by `Arc` between
//! every pair of a run. Kernels need interfaces at the source and receiver
//! depths, which `split_at_depth` provides by returning a new model.

use crate::error::KernelError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Thickness; ignored for the last layer, which is a half-space.
    pub thickness: f64,
    pub vp: f64,
    pub vs: f64,
    pub rho: f64,
    #[serde(default = "default_q")]
    pub qp: f64,
    #[serde(default = "default_q")]
    pub qs: f64,
}

fn default_q() -> f64 {
    1000.0
}

impl Layer {
    pub fn new(thickness: f64, vp: f64, vs: f64, rho: f64) -> Self {
        Self {
            thickness,
            vp,
            vs,
            rho,
            qp: default_q(),
            qs: default_q(),
        }
    }

    fn check(&self, index: usize, last: bool) -> Result<(), KernelError> {
        let invalid = |reason: &str| KernelError::InvalidLayer {
            index,
            reason: reason.to_string(),
        };
        if !last && !(self.thickness.is_finite() && self.thickness > 0.0) {
            return Err(invalid("thickness must be positive"));
        }
        if !(self.vp.is_finite() && self.vp > 0.0) {
            return Err(invalid("vp must be positive"));
        }
        if !(self.vs.is_finite() && self.vs >= 0.0 && self.vs < self.vp) {
            return Err(invalid("vs must be non-negative and below vp"));
        }
        if !(self.rho.is_finite() && self.rho > 0.0) {
            return Err(invalid("rho must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrustModel {
    layers: Vec<Layer>,
}

impl CrustModel {
    pub fn new(layers: Vec<Layer>) -> Result<Self, KernelError> {
        if layers.is_empty() {
            return Err(KernelError::EmptyCrust);
        }
        let last = layers.len() - 1;
        for (index, layer) in layers.iter().enumerate() {
            layer.check(index, index == last)?;
        }
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn nlayers(&self) -> usize {
        self.layers.len()
    }

    /// Depth of the top of each layer.
    pub fn tops(&self) -> Vec<f64> {
        let mut depth = 0.0;
        self.layers
            .iter()
            .map(|layer| {
                let top = depth;
                depth += layer.thickness;
                top
            })
            .collect()
    }

    /// Layer containing `depth`; a layer owns `[top, bottom)`.
    pub fn layer_index(&self, depth: f64) -> Result<usize, KernelError> {
        if !(depth.is_finite() && depth >= 0.0) {
            return Err(KernelError::DepthAboveSurface { depth });
        }
        let last = self.layers.len() - 1;
        let mut bottom = 0.0;
        for (index, layer) in self.layers[..last].iter().enumerate() {
            bottom += layer.thickness;
            if depth < bottom {
                return Ok(index);
            }
        }
        Ok(last)
    }

    /// A new model with an interface at `depth`.
    ///
    /// Splitting at an existing interface or at the surface returns an
    /// identical copy.
    pub fn split_at_depth(&self, depth: f64) -> Result<CrustModel, KernelError> {
        let index = self.layer_index(depth)?;
        let top = self.tops()[index];
        let above = depth - top;
        if above <= 0.0 {
            return Ok(self.clone());
        }
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.extend_from_slice(&self.layers[..index]);
        let original = self.layers[index];
        let mut upper = original;
        upper.thickness = above;
        let mut lower = original;
        if index + 1 < self.layers.len() {
            lower.thickness = original.thickness - above;
        }
        layers.push(upper);
        layers.push(lower);
        layers.extend_from_slice(&self.layers[index + 1..]);
        Ok(CrustModel { layers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_layer() -> CrustModel {
        CrustModel::new(vec![
            Layer::new(1.0, 2.0, 1.0, 2.0),
            Layer::new(0.0, 6.0, 3.5, 2.7),
        ])
        .expect("crust should build")
    }

    #[test]
    fn rejects_empty_and_nonphysical_layers() {
        assert!(matches!(CrustModel::new(vec![]), Err(KernelError::EmptyCrust)));
        let bad = CrustModel::new(vec![Layer::new(1.0, 2.0, 3.0, 2.0), Layer::new(0.0, 6.0, 3.5, 2.7)]);
        assert!(matches!(bad, Err(KernelError::InvalidLayer { index: 0, .. })));
    }

    #[test]
    fn layer_index_uses_half_open_layers() {
        let crust = two_layer();
        assert_eq!(crust.layer_index(0.0).expect("surface"), 0);
        assert_eq!(crust.layer_index(0.999).expect("inside"), 0);
        assert_eq!(crust.layer_index(1.0).expect("interface"), 1);
        assert_eq!(crust.layer_index(50.0).expect("half-space"), 1);
        assert!(crust.layer_index(-0.1).is_err());
    }

    #[test]
    fn split_inserts_interface_without_touching_original() {
        let crust = two_layer();
        let split = crust.split_at_depth(0.25).expect("split should work");
        assert_eq!(crust.nlayers(), 2);
        assert_eq!(split.nlayers(), 3);
        assert_eq!(split.tops(), vec![0.0, 0.25, 1.0]);
        assert_eq!(split.layer_index(0.25).expect("new interface"), 1);

        let deep = crust.split_at_depth(3.0).expect("split half-space");
        assert_eq!(deep.tops(), vec![0.0, 1.0, 3.0]);

        let same = crust.split_at_depth(1.0).expect("split at interface");
        assert_eq!(same, crust);
    }
}
