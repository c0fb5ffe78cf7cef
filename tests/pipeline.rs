mod common;

use common::{failed, ok, ScriptedRunner};
use mtb_amr_tools::alignment::{prepare_sorted_bam, reference_name};
use mtb_amr_tools::consensus::{write_fasta, ConsensusExtractor};
use mtb_amr_tools::depth::{one_hot_rows, run_base_depth, write_one_hot_csv};
use mtb_amr_tools::external::SystemRunner;
use mtb_amr_tools::predict::cnn::SequenceAligner;
use mtb_amr_tools::predict::{nn, rf, ExternalModel, ResistanceStatus};
use mtb_amr_tools::reconcile::reconcile;
use mtb_amr_tools::regions::read_regions;
use mtb_amr_tools::variants::{call_genotypes, TargetSet};
use mtb_amr_tools::PipelineError;
use std::path::Path;
use tempfile::tempdir;

const TARGETS: &str = "POS,REF,ALT,AF\n100,A,G,0.3\n200,C,T,0.05\n300,G,A,0.8\n";

#[test]
fn genotyping_script_feeds_reconciliation() {
    let runner = ScriptedRunner::new(|cmd| {
        ok(cmd, "POS,REF,ALT,GT,DP\n100,A,G,1/1,25\n200,C,T,./.,30\n999,T,C,1/1,40\n")
    });
    let calls = call_genotypes(
        &runner,
        Path::new("/get_genotypes.sh"),
        Path::new("/data/sample.bam"),
        Path::new("/data/target_vars.csv"),
    )
    .unwrap();
    assert_eq!(
        runner.command_lines(),
        vec!["/bin/bash /get_genotypes.sh /data/sample.bam /data/target_vars.csv"]
    );

    let targets = TargetSet::from_reader(TARGETS.as_bytes(), "targets").unwrap();
    let (genotypes, stats) = reconcile(&targets, &calls, 10);
    assert_eq!(genotypes.values(), vec![1.0, 0.05, 0.8]);
    assert_eq!(stats.shared_variants, 2);
    assert_eq!(stats.dropped_variants, 1);
    assert_eq!(stats.missing_variants, 1);
    assert_eq!(stats.noncalls, 1);
    assert_eq!(stats.variants_set_to_af, 2);

    let mut out = Vec::new();
    stats.write_comment_header(&mut out).unwrap();
    genotypes.write_csv(&mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "#parameter,value\n#shared_variants,2\n#dropped_variants,1\n#missing_variants,1\n\
         #noncalls,1\n#variants_set_to_AF,2\nPOS,REF,ALT,GT\n100,A,G,1.0\n200,C,T,0.05\n\
         300,G,A,0.8\n"
    );
}

#[test]
fn blank_genotyping_output_surfaces_stderr() {
    let runner = ScriptedRunner::new(|cmd| {
        let mut output = ok(cmd, "");
        output.stderr = "[E::hts_open_format] fail to open file 'missing.bam'".to_string();
        output
    });
    let err = call_genotypes(
        &runner,
        Path::new("/get_genotypes.sh"),
        Path::new("missing.bam"),
        Path::new("target_vars.csv"),
    )
    .unwrap_err();
    match err {
        PipelineError::UpstreamToolFailure { tool, stderr } => {
            assert_eq!(tool, "get_genotypes.sh");
            assert!(stderr.contains("fail to open file"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn cram_input_is_converted_sorted_and_indexed() {
    let workdir = tempdir().unwrap();
    let runner = ScriptedRunner::new(|cmd| ok(cmd, ""));
    let sorted = prepare_sorted_bam(
        &runner,
        Path::new("reads.cram"),
        Some(Path::new("ref.fa")),
        workdir.path(),
    )
    .unwrap();

    let wd = workdir.path().display();
    assert_eq!(sorted, workdir.path().join("reads.sorted.bam"));
    assert_eq!(
        runner.command_lines(),
        vec![
            format!("samtools view -b -h -T ref.fa -o {wd}/reads.bam reads.cram"),
            format!("samtools sort {wd}/reads.bam -o {wd}/reads.sorted.bam"),
            format!("samtools index {wd}/reads.sorted.bam"),
        ]
    );
}

#[test]
fn bam_input_skips_conversion() {
    let workdir = tempdir().unwrap();
    let runner = ScriptedRunner::new(|cmd| ok(cmd, ""));
    prepare_sorted_bam(&runner, Path::new("reads.bam"), None, workdir.path()).unwrap();
    let lines = runner.command_lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("samtools sort reads.bam"));
}

#[test]
fn failed_sort_stops_preparation() {
    let workdir = tempdir().unwrap();
    let runner = ScriptedRunner::new(|cmd| {
        if cmd.name() == "samtools sort" {
            failed(cmd, "truncated file")
        } else {
            ok(cmd, "")
        }
    });
    let err = prepare_sorted_bam(&runner, Path::new("reads.bam"), None, workdir.path()).unwrap_err();
    assert!(err.to_string().contains("truncated file"));
    assert_eq!(runner.commands.borrow().len(), 1);
}

#[test]
fn base_depth_to_one_hot() {
    let runner = ScriptedRunner::new(|cmd| match cmd.name().as_str() {
        "samtools idxstats" => ok(cmd, "NC_000962.3\t4411532\t1200\t0\n*\t0\t0\t3\n"),
        _ => ok(
            cmd,
            "REF\tPOS\tCOV\tA\tC\tG\tT\tDEL\tREFSKIP\tSAMPLE\n\
             NC_000962.3\t759806\t30\t28\t1\t0\t1\t0\t0\ts\n\
             NC_000962.3\t759807\t30\t0\t0\t0\t2\t28\t0\ts\n\
             NC_000962.3\t759808\t30\t0\t0\t15\t15\t0\t0\ts\n",
        ),
    });
    let bam = Path::new("reads.sorted.bam");
    assert_eq!(reference_name(&runner, bam).unwrap(), "NC_000962.3");

    let depths = run_base_depth(&runner, Path::new("regions.bed"), bam).unwrap();
    assert_eq!(
        runner.command_lines()[1],
        "sambamba depth base -L regions.bed reads.sorted.bam"
    );
    let (rows, dropped) = one_hot_rows(&depths);
    assert_eq!(dropped, 1);

    let mut out = Vec::new();
    write_one_hot_csv(&rows, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "A,C,G,T\n1,0,0,0\n0,0,1,0\n");
}

#[test]
fn consensus_runs_pipeline_then_each_locus() {
    let workdir = tempdir().unwrap();
    let regions = read_regions(
        "locus,start,end\nkatG,2153889,2156111\npncA,2288681,2289241\n".as_bytes(),
        "regions.csv",
    )
    .unwrap();
    let runner = ScriptedRunner::new(|cmd| {
        if cmd.args().iter().any(|a| a.ends_with("katG.fasta")) {
            ok(cmd, "ACGT\nACGT\n")
        } else if cmd.args().iter().any(|a| a.ends_with("pncA.fasta")) {
            ok(cmd, "GGCC\n")
        } else {
            ok(cmd, "")
        }
    });
    let extractor = ConsensusExtractor {
        runner: &runner,
        reference: "/internal_data/refgenome.fa".into(),
        variant_calling_script: "/scripts/variant-calling-pipeline.sh".into(),
        consensus_script: "/scripts/get-aligned-consensus-sequence.sh".into(),
        workdir: workdir.path().to_path_buf(),
        threads: 4,
    };
    let seqs = extractor
        .extract(Path::new("r1.fq.gz"), Path::new("r2.fq.gz"), &regions)
        .unwrap();

    let bed = std::fs::read_to_string(workdir.path().join("target_loci.bed")).unwrap();
    assert_eq!(bed, "Chromosome\t2153888\t2156110\nChromosome\t2288680\t2289240\n");

    let cwd = std::env::current_dir().unwrap();
    let (r1, r2) = (cwd.join("r1.fq.gz"), cwd.join("r2.fq.gz"));
    let lines = runner.command_lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        format!(
            "/bin/bash /scripts/variant-calling-pipeline.sh {} {} \
             /internal_data/refgenome.fa target_loci.bed 4",
            r1.display(),
            r2.display()
        )
    );
    assert_eq!(
        lines[1],
        "/bin/bash /scripts/get-aligned-consensus-sequence.sh /internal_data/refgenome.fa \
         variants.vcf.gz Chromosome:2153889-2156111 alignment-files/katG.fasta"
    );
    assert!(runner
        .commands
        .borrow()
        .iter()
        .all(|c| c.dir() == Some(workdir.path())));

    let mut out = Vec::new();
    write_fasta(&seqs, &mut out).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), ">katG\nACGTACGT\n>pncA\nGGCC\n");
}

#[test]
fn consensus_scripts_share_a_separate_workdir() {
    let scripts = tempdir().unwrap();
    let workdir = tempdir().unwrap();
    let call = scripts.path().join("call.sh");
    let consensus = scripts.path().join("consensus.sh");
    // the pipeline writes its VCF relative to where it runs
    std::fs::write(&call, "touch variants.vcf.gz\n").unwrap();
    std::fs::write(&consensus, "[ -f \"$2\" ] && echo ACGT\n").unwrap();

    let regions = read_regions("locus,start,end\nkatG,10,20\n".as_bytes(), "regions.csv").unwrap();
    let extractor = ConsensusExtractor {
        runner: &SystemRunner,
        reference: scripts.path().join("ref.fa"),
        variant_calling_script: call,
        consensus_script: consensus,
        workdir: workdir.path().to_path_buf(),
        threads: 1,
    };
    let seqs = extractor
        .extract(Path::new("r1.fq"), Path::new("r2.fq"), &regions)
        .unwrap();

    assert_eq!(seqs.len(), 1);
    assert_eq!(seqs[0].sequence, "ACGT");
    assert!(workdir.path().join("variants.vcf.gz").exists());
    assert!(workdir.path().join("target_loci.bed").exists());
}

#[test]
fn consensus_locus_without_output_fails() {
    let workdir = tempdir().unwrap();
    let regions = read_regions("locus,start,end\nkatG,10,20\n".as_bytes(), "regions.csv").unwrap();
    let runner = ScriptedRunner::new(|cmd| ok(cmd, ""));
    let extractor = ConsensusExtractor {
        runner: &runner,
        reference: "ref.fa".into(),
        variant_calling_script: "call.sh".into(),
        consensus_script: "consensus.sh".into(),
        workdir: workdir.path().to_path_buf(),
        threads: 1,
    };
    let err = extractor
        .extract(Path::new("r1.fq"), Path::new("r2.fq"), &regions)
        .unwrap_err();
    assert!(matches!(err, PipelineError::UpstreamToolFailure { .. }));
}

#[test]
fn external_model_scores_feature_csv() {
    let workdir = tempdir().unwrap();
    let features =
        nn::read_one_hot("A,C,G,T\n1,0,0,0\n0,0,0,1\n".as_bytes(), "encoded.csv").unwrap();
    let runner = ScriptedRunner::new(|cmd| {
        let features_csv = cmd.args().last().cloned().unwrap_or_default();
        let written = std::fs::read_to_string(features_csv).unwrap_or_default();
        if written.starts_with("#shape=1,2,4\nA,C,G,T\n1.0,0.0,0.0,0.0\n") {
            ok(cmd, "3.0 -3.0 0.0 0 0 0 0 0 0 0 0 0 0\n")
        } else {
            failed(cmd, "unexpected features")
        }
    });
    let model = ExternalModel {
        runner: &runner,
        scorer: "/internal_data/score-model".into(),
        model: "/internal_data/model".into(),
        workdir: workdir.path().to_path_buf(),
    };

    let predictions = nn::predict(&model, &features).unwrap();
    assert_eq!(predictions.len(), 13);
    assert_eq!(predictions[0].drug, "AMIKACIN");
    assert_eq!(predictions[0].status, ResistanceStatus::R);
    assert_eq!(predictions[1].status, ResistanceStatus::S);
    // sigmoid(0) is exactly the cutoff
    assert_eq!(predictions[2].probability, 0.5);
    assert_eq!(predictions[2].status, ResistanceStatus::S);
}

#[test]
fn short_model_output_is_rejected() {
    let workdir = tempdir().unwrap();
    let features = nn::read_one_hot("A,C,G,T\n1,0,0,0\n".as_bytes(), "encoded.csv").unwrap();
    let runner = ScriptedRunner::new(|cmd| ok(cmd, "0.1 0.2"));
    let model = ExternalModel {
        runner: &runner,
        scorer: "score".into(),
        model: "model".into(),
        workdir: workdir.path().to_path_buf(),
    };
    assert!(matches!(
        nn::predict(&model, &features),
        Err(PipelineError::MalformedInput { .. })
    ));
}

#[test]
fn rf_prediction_through_scorer() {
    let workdir = tempdir().unwrap();
    let targets = TargetSet::from_reader(TARGETS.as_bytes(), "targets").unwrap();
    let features = rf::read_genotypes(
        "#parameter,value\n#noncalls,0\nPOS,REF,ALT,GT\n300,G,A,0.8\n100,A,G,1.0\n200,C,T,0.0\n"
            .as_bytes(),
        "genotypes.csv",
        &targets,
    )
    .unwrap();
    assert_eq!(features.columns, vec!["100_A_G", "200_C_T", "300_G_A"]);
    assert_eq!(features.rows, vec![vec![1.0, 0.0, 0.8]]);

    let runner = ScriptedRunner::new(|cmd| ok(cmd, "0.5\n"));
    let model = ExternalModel {
        runner: &runner,
        scorer: "score".into(),
        model: "model.pkl".into(),
        workdir: workdir.path().to_path_buf(),
    };
    let prediction = rf::predict(&model, &features).unwrap();
    assert_eq!(prediction.resistance_status, ResistanceStatus::R);
    assert_eq!(
        runner.command_lines(),
        vec![format!("score model.pkl {}/features.csv", workdir.path().display())]
    );
}

#[test]
fn aligner_returns_uppercased_gapped_sequence() {
    let workdir = tempdir().unwrap();
    let runner = ScriptedRunner::new(|cmd| ok(cmd, "ac-gt\nnn--\n"));
    let aligner = SequenceAligner {
        runner: &runner,
        script: "/scripts/add-to-alignment.sh".into(),
        alignments_dir: "/internal_data/alignments".into(),
        workdir: workdir.path().to_path_buf(),
    };
    let aligned = aligner.align("katG", "ACGT").unwrap();
    assert_eq!(aligned, "AC-GTNN--");

    let input = std::fs::read_to_string(workdir.path().join("input-seq.fa")).unwrap();
    assert_eq!(input, ">katG\nACGT\n");
    assert!(runner.command_lines()[0].ends_with("/internal_data/alignments/katG.fasta"));
}
