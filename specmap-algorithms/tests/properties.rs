#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2};
use specmap_algorithms::{
    ChannelRange, Error, IntegrationMethod, MapWarning, SpectralData, SpectralDataset, ValueMethod,
};

/// 4x3 grid of Gaussian peaks centred off-axis; peak width grows along x.
fn gaussian_grid() -> SpectralDataset {
    let channels = 41;
    let wavelength = Array1::linspace(1000.0, 1040.0, channels);
    let mut spectra = Array2::zeros((12, channels));
    let mut x = Array1::zeros(12);
    let mut y = Array1::zeros(12);
    for i in 0..12 {
        let (gx, gy) = (i / 3, i % 3);
        x[i] = gx as f64;
        y[i] = gy as f64;
        let sigma = 3.0 + gx as f64;
        let height = 1.0 + gy as f64;
        for j in 0..channels {
            let d = j as f64 - 18.0;
            spectra[[i, j]] = height * (-d * d / (2.0 * sigma * sigma)).exp() + 0.1;
        }
    }
    let data = SpectralData::new(spectra, wavelength, x, y).unwrap();
    SpectralDataset::new("gaussians", data)
}

#[test]
fn test_fwhm_within_one_channel() {
    let mut dataset = gaussian_grid();
    let lookup = dataset.data().find_range(1005.0, 1035.0).unwrap();
    assert!(!lookup.collapsed);
    let outcome = dataset
        .univariate(
            lookup.range,
            "fwhm",
            ValueMethod::Bandwidth,
            IntegrationMethod::RiemannSum,
            0,
        )
        .unwrap();
    let map = dataset.maps().get(outcome.index).unwrap();
    assert_eq!(map.map_type(), "1-Region Univariate (Bandwidth (FWHM))");
    for i in 0..12 {
        let sigma = 3.0 + (i / 3) as f64;
        let expected = 2.0 * (2.0 * 2.0_f64.ln()).sqrt() * sigma;
        assert!(
            (map.values()[i] - expected).abs() <= 1.0,
            "spectrum {}: width {} vs {}",
            i,
            map.values()[i],
            expected
        );
    }
    assert!(map.diagnostics().half_max_lines.is_some());
}

#[test]
fn test_unit_area_invariant() {
    let mut dataset = gaussian_grid();
    dataset.unit_area_normalize().unwrap();
    for row in dataset.data().spectra().rows() {
        assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_non_spatial_guard() {
    let source = gaussian_grid();
    let mut subset = SpectralDataset::from_selection("subset", &source, &[0, 4, 8]).unwrap();
    assert!(subset.data().is_non_spatial());

    let region = ChannelRange::new(10, 30);
    let results = [
        subset
            .univariate(region, "u", ValueMethod::Intensity, IntegrationMethod::RiemannSum, 0)
            .map(|_| ()),
        subset
            .band_ratio(region, region, "b", ValueMethod::Area, IntegrationMethod::RiemannSum, 0)
            .map(|_| ()),
        subset.principal_components_map(0, "p", 0, false, false).map(|_| ()),
        subset.vertex_components_map(2, 0, "v", 0, false).map(|_| ()),
        subset.partial_least_squares_map(1, 0, "l", 0, false).map(|_| ()),
        subset.k_means_map(2, "k").map(|_| ()),
    ];
    for result in results {
        assert_eq!(result, Err(Error::NonSpatial));
    }
    assert!(subset.maps().is_empty());
    assert!(subset.principal_components().is_none());
    assert!(subset.k_means().is_none());

    // transforms still work on a subset
    subset.min_max_normalize().unwrap();
}

#[test]
fn test_kmeans_separated_clusters() {
    let channels = 5;
    let centres = [[0.0, 1.0, 0.0, 1.0, 0.0], [5.0, 5.0, 5.0, 5.0, 5.0], [9.0, 0.0, 9.0, 0.0, 9.0]];
    let mut spectra = Array2::zeros((9, channels));
    for i in 0..9 {
        for j in 0..channels {
            spectra[[i, j]] = centres[i % 3][j] + 0.01 * (i / 3) as f64;
        }
    }
    let x = Array1::from_iter((0..9).map(|i| (i % 3) as f64));
    let y = Array1::from_iter((0..9).map(|i| (i / 3) as f64));
    let data = SpectralData::new(spectra, Array1::linspace(1.0, 5.0, channels), x, y).unwrap();
    let mut dataset = SpectralDataset::new("blobs", data);

    dataset.k_means_map(3, "k").unwrap();
    let labels = dataset.maps().find("k").unwrap().values().to_vec();
    assert!(labels.iter().all(|&l| (1.0..=3.0).contains(&l)));
    for i in 0..9 {
        assert_eq!(labels[i], labels[i % 3]);
    }
    let mut distinct = labels.clone();
    distinct.sort_by(f64::total_cmp);
    distinct.dedup();
    assert_eq!(distinct.len(), 3);
}

#[test]
fn test_pls_clamp_reports_highest_component() {
    let mut dataset = gaussian_grid();
    let outcome = dataset
        .partial_least_squares_map(2, 7, "pls", 0, false)
        .unwrap();
    let computed = dataset.partial_least_squares().unwrap().component_count();
    assert_eq!(
        outcome.warning,
        Some(MapWarning::ComponentClamped {
            requested: 7,
            used: computed - 1
        })
    );
    let (expected, _) = dataset.partial_least_squares().unwrap().results(computed - 1);
    assert_eq!(dataset.maps().get(outcome.index).unwrap().values(), &expected);
}

#[test]
fn test_vca_abundance_maps_recover_pure_pixels() {
    let endmembers = [[1.0, 0.1, 0.2, 0.6], [0.1, 1.0, 0.3, 0.2], [0.2, 0.2, 1.0, 0.9]];
    let weights = [
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.3, 0.3, 0.4],
        [0.6, 0.2, 0.2],
        [0.1, 0.7, 0.2],
    ];
    let spectra = Array2::from_shape_fn((6, 4), |(i, j)| {
        (0..3).map(|k| weights[i][k] * endmembers[k][j]).sum::<f64>()
    });
    let x = Array1::from_iter((0..6).map(|i| (i % 3) as f64));
    let y = Array1::from_iter((0..6).map(|i| (i / 3) as f64));
    let data = SpectralData::new(spectra, Array1::linspace(1.0, 4.0, 4), x, y).unwrap();
    let mut dataset = SpectralDataset::new("mix", data);

    for k in 0..3 {
        dataset.vertex_components_map(3, k, format!("em{}", k + 1), 0, false).unwrap();
    }
    let model = dataset.vertex_components().unwrap();
    let mut pure = model.indices().to_vec();
    pure.sort_unstable();
    assert_eq!(pure, vec![0, 1, 2]);

    for (k, &pixel) in model.indices().iter().enumerate() {
        let map = dataset.maps().get(k).unwrap();
        assert_abs_diff_eq!(map.values()[pixel], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(map.values()[3], weights[3][pixel], epsilon = 1e-9);
    }
}

#[test]
fn test_transforms_chain_and_undo() {
    let mut dataset = gaussian_grid();
    let original = dataset.data().spectra().clone();
    dataset.median_filter(5).unwrap();
    dataset.singular_value_denoise(3).unwrap();
    let denoised = dataset.data().spectra().clone();
    dataset.derivatize(1, 2, 7).unwrap();
    assert_eq!(dataset.last_operation(), "Savitzky-Golay filtering");

    assert!(dataset.undo());
    assert_eq!(dataset.data().spectra(), &denoised);
    assert!(dataset.undo());
    assert_ne!(dataset.data().spectra(), &original);
}

#[test]
fn test_crop_keeps_inner_positions() {
    let mut dataset = gaussian_grid();
    // x = 0 rows are the first three, consecutive
    let removed = dataset.crop(1.0, 3.0, 0.0, 2.0).unwrap();
    assert_eq!(removed, 3);
    assert_eq!(dataset.data().len(), 9);
    assert!(dataset.data().x().iter().all(|&v| v >= 1.0));
    assert_eq!(dataset.data().key_size(), 3);
}
