//! # Laplace Bayes Factor
//!
//! Per-site association test between a haplotype's allele and whether it sits
//! in a long copying block.
//!
//! Each haplotype's allele is Bernoulli with success probability
//!
//! ```text
//! q = w * sigmoid(mu + beta) + (1 - w) * sigmoid(mu)
//! ```
//!
//! where `w` is its long-block posterior. H1 fits `(mu, beta)` with priors
//! `mu ~ N(0, 1)`, `beta ~ N(0, sigma_beta^2)`; H0 fixes `beta = 0`. Both are
//! fitted by a fixed number of Newton-Raphson steps from zero, and each
//! marginal likelihood is approximated as
//!
//! ```text
//! log L(theta) + log prior(theta) - 0.5 * log det(-H(theta))
//! ```
//!
//! at the fitted parameters.

use std::f64::consts::{LOG10_E, PI};

use crate::error::{AbacusError, Result};

/// Log-likelihood with its gradient and Hessian in `(mu, beta)`
#[derive(Clone, Copy, Debug, Default)]
struct Derivatives {
    loglik: f64,
    grad: [f64; 2],
    hess: [[f64; 2]; 2],
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Value, first and second derivative of the logistic function
#[inline]
fn logistic(x: f64) -> (f64, f64, f64) {
    let s = sigmoid(x);
    let d1 = s * (1.0 - s);
    (s, d1, d1 * (1.0 - 2.0 * s))
}

fn normal_log_density(x: f64, variance: f64) -> f64 {
    -0.5 * (2.0 * PI * variance).ln() - 0.5 * x * x / variance
}

/// Result of the test at one site
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SiteInference {
    /// log10 Bayes factor of H1 against H0
    pub log10_bf: f64,
    /// Fitted effect size under H1
    pub beta: f64,
}

/// Two-model Laplace comparison with fixed-step Newton-Raphson fits
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaplaceApproximation {
    sigma_beta: f64,
    iterations: usize,
}

impl LaplaceApproximation {
    /// `iterations` is K: the fits take K - 1 Newton steps
    pub fn new(sigma_beta: f64, iterations: usize) -> Result<Self> {
        if !(sigma_beta.is_finite() && sigma_beta > 0.0) {
            return Err(AbacusError::config(format!(
                "Prior standard deviation of beta must be positive, got {}",
                sigma_beta
            )));
        }
        if iterations == 0 {
            return Err(AbacusError::config("Newton-Raphson iteration count must be at least 1"));
        }
        Ok(Self {
            sigma_beta,
            iterations,
        })
    }

    pub fn sigma_beta(&self) -> f64 {
        self.sigma_beta
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Log10 Bayes factor and effect size for one site
    pub fn infer(&self, prob_long: &[f64], alleles: &[bool]) -> Result<SiteInference> {
        if prob_long.len() != alleles.len() {
            return Err(AbacusError::invalid_data(format!(
                "{} long-block probabilities for {} alleles",
                prob_long.len(),
                alleles.len()
            )));
        }
        let var_beta = self.sigma_beta * self.sigma_beta;

        let (mu1, beta1) = self.fit_h1(prob_long, alleles)?;
        let h1 = self.posterior_derivatives(mu1, beta1, prob_long, alleles);
        let det = h1.hess[0][0] * h1.hess[1][1] - h1.hess[0][1] * h1.hess[1][0];
        if !(det > 0.0) {
            return Err(AbacusError::numeric(
                "H1 marginal likelihood",
                format!("det(-H) = {} is not positive", det),
            ));
        }
        let marginal_h1 = h1.loglik
            + normal_log_density(mu1, 1.0)
            + normal_log_density(beta1, var_beta)
            - 0.5 * det.ln();

        let mu0 = self.fit_h0(prob_long, alleles)?;
        let h0 = self.posterior_derivatives(mu0, 0.0, prob_long, alleles);
        let curvature = -h0.hess[0][0];
        if !(curvature > 0.0) {
            return Err(AbacusError::numeric(
                "H0 marginal likelihood",
                format!("-H = {} is not positive", curvature),
            ));
        }
        let marginal_h0 = h0.loglik + normal_log_density(mu0, 1.0) - 0.5 * curvature.ln();

        let log10_bf = (marginal_h1 - marginal_h0) * LOG10_E;
        if !log10_bf.is_finite() || !beta1.is_finite() {
            return Err(AbacusError::numeric(
                "Bayes factor",
                format!("log10 BF = {}, beta = {}", log10_bf, beta1),
            ));
        }
        Ok(SiteInference {
            log10_bf,
            beta: beta1,
        })
    }

    /// Newton-Raphson for `(mu, beta)` under H1, solving the 2x2 system in closed form
    fn fit_h1(&self, prob_long: &[f64], alleles: &[bool]) -> Result<(f64, f64)> {
        let (mut mu, mut beta) = (0.0, 0.0);
        for step in 1..self.iterations {
            let d = self.posterior_derivatives(mu, beta, prob_long, alleles);
            let [[a, b], [c, e]] = d.hess;
            let det = a * e - b * c;
            if det == 0.0 || !det.is_finite() {
                return Err(AbacusError::numeric(
                    "H1 Newton-Raphson",
                    format!("singular Hessian at step {} (det = {})", step, det),
                ));
            }
            let [g_mu, g_beta] = d.grad;
            mu -= (e * g_mu - b * g_beta) / det;
            beta -= (-c * g_mu + a * g_beta) / det;
            if !(mu.is_finite() && beta.is_finite()) {
                return Err(AbacusError::numeric(
                    "H1 Newton-Raphson",
                    format!("diverged at step {}", step),
                ));
            }
        }
        Ok((mu, beta))
    }

    /// Scalar Newton-Raphson for `mu` under H0
    fn fit_h0(&self, prob_long: &[f64], alleles: &[bool]) -> Result<f64> {
        let mut mu = 0.0;
        for step in 1..self.iterations {
            let d = self.posterior_derivatives(mu, 0.0, prob_long, alleles);
            let h = d.hess[0][0];
            if h == 0.0 || !h.is_finite() {
                return Err(AbacusError::numeric(
                    "H0 Newton-Raphson",
                    format!("singular Hessian at step {} (H = {})", step, h),
                ));
            }
            mu -= d.grad[0] / h;
            if !mu.is_finite() {
                return Err(AbacusError::numeric(
                    "H0 Newton-Raphson",
                    format!("diverged at step {}", step),
                ));
            }
        }
        Ok(mu)
    }

    /// Data derivatives plus the prior's penalty terms
    fn posterior_derivatives(
        &self,
        mu: f64,
        beta: f64,
        prob_long: &[f64],
        alleles: &[bool],
    ) -> Derivatives {
        let mut d = data_derivatives(mu, beta, prob_long, alleles);
        let inv_var = 1.0 / (self.sigma_beta * self.sigma_beta);
        d.grad[0] -= mu;
        d.grad[1] -= beta * inv_var;
        d.hess[0][0] -= 1.0;
        d.hess[1][1] -= inv_var;
        d
    }
}

/// Log-likelihood of the allele mixture model and its derivatives
fn data_derivatives(mu: f64, beta: f64, prob_long: &[f64], alleles: &[bool]) -> Derivatives {
    let (s1, d1, dd1) = logistic(mu + beta);
    let (s0, d0, dd0) = logistic(mu);

    let mut out = Derivatives::default();
    for (&w, &allele) in prob_long.iter().zip(alleles) {
        let q = w * s1 + (1.0 - w) * s0;
        let (f, sign) = if allele { (q, 1.0) } else { (1.0 - q, -1.0) };

        let f_mu = sign * (w * d1 + (1.0 - w) * d0);
        let f_beta = sign * w * d1;
        let f_mumu = sign * (w * dd1 + (1.0 - w) * dd0);
        let f_betabeta = sign * w * dd1;
        let f_mubeta = sign * w * dd1;

        let f2 = f * f;
        out.loglik += f.ln();
        out.grad[0] += f_mu / f;
        out.grad[1] += f_beta / f;
        out.hess[0][0] += (f_mumu * f - f_mu * f_mu) / f2;
        out.hess[1][1] += (f_betabeta * f - f_beta * f_beta) / f2;
        out.hess[0][1] += (f_mubeta * f - f_mu * f_beta) / f2;
    }
    out.hess[1][0] = out.hess[0][1];
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laplace() -> LaplaceApproximation {
        LaplaceApproximation::new(1.0, 10).unwrap()
    }

    #[test]
    fn test_uninformative_site() {
        let alleles = [true, false, true, true, false, false];
        let prob_long = [0.0; 6];
        let result = laplace().infer(&prob_long, &alleles).unwrap();

        // beta never moves; only the prior normalisations differ between models
        assert!(result.beta.abs() < 1e-12);
        let baseline = -0.5 * (2.0 * PI).log10();
        assert!((result.log10_bf - baseline).abs() < 1e-9, "{}", result.log10_bf);
    }

    #[test]
    fn test_flat_beta_prior_is_singular() {
        // 1 / sigma_beta^2 underflows to zero and no haplotype informs beta
        let result = LaplaceApproximation::new(1e200, 10)
            .unwrap()
            .infer(&[0.0; 6], &[true, false, true, true, false, false]);
        match result {
            Err(AbacusError::Numeric { context, message }) => {
                assert_eq!(context, "H1 Newton-Raphson");
                assert!(message.contains("singular Hessian"), "{}", message);
            }
            other => panic!("expected numeric error, got {:?}", other),
        }
    }

    #[test]
    fn test_all_same_allele_without_information() {
        for allele in [true, false] {
            let result = laplace().infer(&[0.0; 8], &[allele; 8]).unwrap();
            assert!(result.beta.abs() < 1e-12);
            assert!((result.log10_bf + 0.5 * (2.0 * PI).log10()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_allele_flip_symmetry() {
        let prob_long = [0.9, 0.1, 0.7, 0.3, 0.0, 0.55, 0.8, 0.2];
        let alleles = [true, false, true, true, false, false, true, false];
        let flipped: Vec<bool> = alleles.iter().map(|a| !a).collect();

        let a = laplace().infer(&prob_long, &alleles).unwrap();
        let b = laplace().infer(&prob_long, &flipped).unwrap();
        assert!((a.beta + b.beta).abs() < 1e-9);
        assert!((a.log10_bf - b.log10_bf).abs() < 1e-9);
    }

    #[test]
    fn test_association_detected() {
        let mut prob_long = Vec::new();
        let mut alleles = Vec::new();
        for _ in 0..100 {
            prob_long.push(1.0);
            alleles.push(true);
            prob_long.push(0.0);
            alleles.push(false);
        }
        let result = laplace().infer(&prob_long, &alleles).unwrap();
        assert!(result.beta > 0.0);
        assert!(result.log10_bf > 1.0, "{}", result.log10_bf);
    }

    #[test]
    fn test_single_iteration_stays_at_zero() {
        let la = LaplaceApproximation::new(1.0, 1).unwrap();
        let result = la.infer(&[1.0, 1.0], &[true, true]).unwrap();
        assert_eq!(result.beta, 0.0);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(LaplaceApproximation::new(0.0, 10).is_err());
        assert!(LaplaceApproximation::new(1.0, 0).is_err());
        assert!(laplace().infer(&[0.5], &[true, false]).is_err());
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let prob_long = [0.9, 0.1, 0.7, 0.3];
        let alleles = [true, false, false, true];
        let (mu, beta) = (0.3, -0.4);
        let h = 1e-5;
        let at = |m: f64, b: f64| data_derivatives(m, b, &prob_long, &alleles);
        let d = at(mu, beta);

        let g_mu = (at(mu + h, beta).loglik - at(mu - h, beta).loglik) / (2.0 * h);
        let g_beta = (at(mu, beta + h).loglik - at(mu, beta - h).loglik) / (2.0 * h);
        assert!((d.grad[0] - g_mu).abs() < 1e-6);
        assert!((d.grad[1] - g_beta).abs() < 1e-6);

        let h_mubeta = (at(mu, beta + h).grad[0] - at(mu, beta - h).grad[0]) / (2.0 * h);
        let h_betabeta = (at(mu, beta + h).grad[1] - at(mu, beta - h).grad[1]) / (2.0 * h);
        let h_mumu = (at(mu + h, beta).grad[0] - at(mu - h, beta).grad[0]) / (2.0 * h);
        assert!((d.hess[0][1] - h_mubeta).abs() < 1e-6);
        assert!((d.hess[1][1] - h_betabeta).abs() < 1e-6);
        assert!((d.hess[0][0] - h_mumu).abs() < 1e-6);
    }
}
