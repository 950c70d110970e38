//! Kernel parameters

use anyhow::anyhow;

use crate::graph::product::{PairingMode, ProductParams};

/// largest absolute beta accepted for diffusion weighting, heat kernels of larger decays overflow
pub const DIFFUSION_BETA_MAX: f64 = 1.0e150;

/// Which sequences are counted by walk based kernels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceMode {
    /// all walks
    Walks,
    /// walks never coming back to the node just left
    NonTottering,
    /// walks without repeated atom
    Paths,
}

/// How atoms are weighted according to their distance $d$ to the reaction core.
#[cfg_attr(doc, katexit::katexit)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Weighting {
    /// $\alpha^{-d}$, 0 if $\alpha \le 0$
    Exponential { alpha: f64 },
    /// $1/(1 + e^{\beta (d - 0.5)})$
    Logistic { beta: f64 },
    /// maximal heat kernel value from a core atom with decay $|\beta|$, complemented to 1 if $\beta < 0$
    Diffusion { beta: f64 },
}

/// How the occurrence counts of a subgraph class in two graphs are combined
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelOperation {
    /// n1 * n2
    Dot,
    /// 1 for each common class
    Indicator,
    /// min(n1, n2)
    Min,
    /// min(n1, n2) divided by the geometric mean of the number of subgraphs of the class size in each graph
    MinNormalized,
}

/// Parameters shared by all kernels.
#[derive(Debug, Copy, Clone)]
pub struct KernelParams {
    /// length decay for enumerative kernels, continuation probability for marginal kernels
    pub lambda : f64,
    /// atom weighting
    pub weighting : Weighting,
    /// iterations stop when the relative increase of the kernel value goes below epsilon
    pub epsilon : f64,
    /// maximal number of atoms in a walk, path or subgraph
    pub maxlen : usize,
    /// sequences counted
    pub mode : SequenceMode,
    /// atoms are paired only if they have the same symbol
    pub node_match : bool,
    /// bonds are paired only if they have the same type
    pub edge_match : bool,
    /// pairs mixing core and non core atoms are excluded
    pub reduced : bool,
    /// cosine normalization of the kernel matrix
    pub normalize : bool,
    /// each walk length is normalized by the self kernels of that length
    pub partial_norm : bool,
    /// subgraph kernel combination
    pub operation : KernelOperation,
} // end of KernelParams

impl KernelParams {
    pub fn new(lambda: f64, weighting: Weighting, epsilon: f64, maxlen: usize, mode: SequenceMode) -> Self {
        KernelParams {
            lambda,
            weighting,
            epsilon,
            maxlen,
            mode,
            ..Default::default()
        }
    }

    ///
    pub fn get_lambda(&self) -> f64 {
        self.lambda
    }

    ///
    pub fn get_weighting(&self) -> Weighting {
        self.weighting
    }

    ///
    pub fn get_epsilon(&self) -> f64 {
        self.epsilon
    }

    ///
    pub fn get_maxlen(&self) -> usize {
        self.maxlen
    }

    ///
    pub fn get_mode(&self) -> SequenceMode {
        self.mode
    }

    /// product graph construction corresponding to node matching, edge matching and reduction flags
    pub fn get_product_params(&self) -> ProductParams {
        let pairing = if self.node_match {
            PairingMode::LabelBlocks
        } else {
            PairingMode::AllPairs
        };
        ProductParams::new(pairing, self.node_match, self.edge_match, self.reduced)
    }

    /// checks values are usable
    pub fn check(&self) -> anyhow::Result<()> {
        if self.maxlen == 0 {
            return Err(anyhow!("maxlen must be at least 1"));
        }
        if !(self.epsilon >= 0.) {
            return Err(anyhow!("epsilon must be non negative, got {}", self.epsilon));
        }
        if !(self.lambda >= 0.) || !self.lambda.is_finite() {
            return Err(anyhow!("lambda must be a non negative finite number, got {}", self.lambda));
        }
        match self.weighting {
            Weighting::Exponential { alpha } if alpha.is_nan() => Err(anyhow!("alpha is NaN")),
            Weighting::Logistic { beta } | Weighting::Diffusion { beta } if beta.is_nan() => {
                Err(anyhow!("beta is NaN"))
            }
            Weighting::Diffusion { beta } if !(beta.abs() <= DIFFUSION_BETA_MAX) => Err(anyhow!(
                "diffusion weighting needs |beta| <= {:.1e}, got {:.3e}",
                DIFFUSION_BETA_MAX,
                beta
            )),
            _ => Ok(()),
        }
    } // end of check

    /// a short code describing parameters, used to name output files
    pub fn param_code(&self) -> String {
        let mut code = match self.mode {
            SequenceMode::Walks => String::from("walks"),
            SequenceMode::NonTottering => String::from("nontot"),
            SequenceMode::Paths => String::from("paths"),
        };
        code.push_str(&format!("-l{:.2}", self.lambda));
        match self.weighting {
            Weighting::Exponential { alpha } => code.push_str(&format!("-exp{:.2}", alpha)),
            Weighting::Logistic { beta } => code.push_str(&format!("-log{}", short_float(beta))),
            Weighting::Diffusion { beta } => code.push_str(&format!("-dif{:.2}", beta)),
        }
        code.push_str(&format!("-k{}", self.maxlen));
        if self.reduced {
            code.push_str("-r");
        }
        if self.edge_match {
            code.push_str("-em");
        }
        if !self.node_match {
            code.push_str("-nonm");
        }
        if self.partial_norm {
            code.push_str("-pn");
        }
        if self.normalize {
            code.push_str("-n");
        }
        code
    } // end of param_code
} // end of impl KernelParams

fn short_float(x: f64) -> String {
    if x == f64::MAX {
        String::from("inf")
    } else {
        format!("{:.2}", x)
    }
}

impl Default for KernelParams {
    fn default() -> Self {
        KernelParams {
            lambda: 0.90,
            weighting: Weighting::Exponential { alpha: 1.0 },
            epsilon: 1.0e-4,
            maxlen: 20,
            mode: SequenceMode::Walks,
            node_match: true,
            edge_match: false,
            reduced: false,
            normalize: false,
            partial_norm: false,
            operation: KernelOperation::Dot,
        }
    }
} // end of impl Default for KernelParams

// end of mod tests
