use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use catnet::io::{load_network_params, read_images, save_network_params, write_images};
use catnet::nn::CIFAR10_INPUT;
use catnet::{
    classify_cats, classify_with, ClassifyOptions, CnnError, EngineConfig, Network, Volume,
    CAT_LABEL,
};

/// Zero parameter files for the CIFAR-10 topology, with `fc_bias` as the fc biases.
fn write_zero_params(dir: &Path, fc_bias: &[f64; 10]) {
    let conv = |depth: usize, filters: usize| {
        let weights = vec!["0"; filters * 5 * 5 * depth].join(" ");
        let biases = vec!["0"; filters].join(" ");
        format!("5 5 {} {}\n{}\n{}\n", depth, filters, weights, biases)
    };
    fs::write(dir.join("conv0.txt"), conv(3, 16)).unwrap();
    fs::write(dir.join("conv3.txt"), conv(16, 20)).unwrap();
    fs::write(dir.join("conv6.txt"), conv(20, 20)).unwrap();

    let weights = vec!["0"; 10 * 320].join(" ");
    let biases: Vec<String> = fc_bias.iter().map(|b| b.to_string()).collect();
    fs::write(
        dir.join("fc9.txt"),
        format!("320 10\n{}\n{}\n", weights, biases.join(" ")),
    )
    .unwrap();
}

fn some_images(n: u64) -> Vec<Volume> {
    (0..n)
        .map(|s| {
            let mut v = Volume::rand(CIFAR10_INPUT, s);
            // pixel-like range
            v.data_mut().iter_mut().for_each(|x| *x = (*x + 0.5) * 255.0);
            v
        })
        .collect()
}

#[test]
fn zero_weights_give_uniform_distribution() {
    let dir = tempfile::tempdir().unwrap();
    write_zero_params(dir.path(), &[0.0; 10]);
    let mut net = Network::cifar10().unwrap();
    load_network_params(&mut net, dir.path()).unwrap();

    for image in some_images(4) {
        let out = net.predict(&image).unwrap();
        for &p in out.data() {
            assert_relative_eq!(p, 0.1, epsilon = 1e-12);
        }
    }
}

#[test]
fn cat_bias_raises_cat_probability() {
    let dir = tempfile::tempdir().unwrap();
    let mut bias = [0.0; 10];
    bias[CAT_LABEL] = 2.5;
    write_zero_params(dir.path(), &bias);

    let cfg = EngineConfig {
        params_dir: Some(dir.path().to_path_buf()),
        ..EngineConfig::default()
    };
    let net = cfg.load_network().unwrap();
    let probs = classify_cats(&net, &some_images(5)).unwrap();

    let e = 2.5f64.exp();
    for p in probs {
        assert!(p > 0.1);
        assert_relative_eq!(p, e / (e + 9.0), epsilon = 1e-12);
    }
}

#[test]
fn mismatched_conv_header_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_zero_params(dir.path(), &[0.0; 10]);
    // layer 0 of this network is built for 3x3 filters over depth 3
    let cfg = EngineConfig::from_json(
        r#"{
            "layers": [
                { "type": "conv", "size": 3, "filters": 16, "stride": 1, "pad": 1 },
                { "type": "relu" },
                { "type": "pool", "size": 2, "stride": 2 },
                { "type": "fc", "neurons": 10 },
                { "type": "softmax" }
            ]
        }"#,
    )
    .unwrap();
    let mut net = cfg.build_network().unwrap();

    match load_network_params(&mut net, dir.path()).unwrap_err() {
        CnnError::Load { path, source } => {
            assert!(path.ends_with("conv0.txt"));
            assert!(matches!(
                *source,
                CnnError::HeaderMismatch {
                    field: "sx",
                    expected: 3,
                    got: 5
                }
            ));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn trained_like_network_is_stable_across_schedules() {
    let dir = tempfile::tempdir().unwrap();
    let mut net = Network::cifar10().unwrap();
    net.init_random(2024);
    save_network_params(&net, dir.path()).unwrap();

    let mut loaded = Network::cifar10().unwrap();
    load_network_params(&mut loaded, dir.path()).unwrap();

    let images = some_images(9);
    let image_file = dir.path().join("images.txt");
    write_images(&image_file, &images).unwrap();
    let images = read_images(&image_file, CIFAR10_INPUT).unwrap();

    let alone: Vec<f64> = images
        .iter()
        .map(|img| net.predict(img).unwrap().data()[CAT_LABEL])
        .collect();

    for group_size in [1, 4] {
        let mut out = vec![0.0; images.len()];
        let opts = ClassifyOptions {
            group_size,
            ..ClassifyOptions::default()
        };
        classify_with(&loaded, &images, &mut out, &opts).unwrap();
        for (a, b) in out.iter().zip(&alone) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
            assert!((0.0..=1.0).contains(a));
        }
    }
}
