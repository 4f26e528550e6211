//! Property checks over seeded pseudo-random inputs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tremor_kernel::{
    BlockPartition, CanonicalSet, DedupConfig, Deduplicator, OutputWindow, PairSchedule,
    PairTable, PointSource, ProcessLayout, Station, StationResponse, StationSchedule, TimedTraces,
    Tolerance, uncovered_in,
};

fn layout(rank: usize, nprocs: usize) -> ProcessLayout {
    ProcessLayout::new(rank, nprocs).expect("layout should be valid")
}

fn random_scene(rng: &mut StdRng, nstations: usize, nsources: usize) -> PairTable {
    let stations: Vec<Station> = (0..nstations)
        .map(|_| {
            Station::new([
                rng.random_range(0.0..0.5),
                rng.random_range(0.0..0.5),
                rng.random_range(0.0..0.004),
            ])
        })
        .collect();
    let sources: Vec<PointSource> = (0..nsources)
        .map(|_| PointSource::new([rng.random_range(0.0..0.5), 0.0, rng.random_range(1.0..2.0)], [0.0; 3]))
        .collect();
    PairTable::build(&stations, &sources)
}

#[test]
fn pair_round_robin_is_an_exact_partition() {
    for nprocs in 1..6 {
        let total = 37;
        let mut owners = vec![0usize; total];
        for rank in 0..nprocs {
            let schedule = PairSchedule::new(layout(rank, nprocs));
            for i in schedule.owned(total) {
                owners[i] += 1;
            }
        }
        assert!(owners.iter().all(|&n| n == 1), "nprocs={nprocs}: {owners:?}");
    }
}

#[test]
fn station_round_robin_is_an_exact_partition() {
    for nprocs in 1..6 {
        let nstations = 11;
        let mut owners = vec![0usize; nstations];
        for rank in 0..nprocs {
            for s in StationSchedule::new(layout(rank, nprocs)).owned(nstations) {
                owners[s] += 1;
            }
        }
        assert!(owners.iter().all(|&n| n == 1), "nprocs={nprocs}: {owners:?}");
    }
}

#[test]
fn block_partition_is_an_exact_partition() {
    for total in [0, 1, 5, 64, 1001] {
        for nprocs in 1..8 {
            let partition = BlockPartition::new(total, nprocs).expect("partition");
            let covered: Vec<usize> = partition.ranges().into_iter().flatten().collect();
            assert_eq!(covered, (0..total).collect::<Vec<_>>());
        }
    }
}

#[test]
fn pair_schedule_snapshot() {
    let mut lines = Vec::new();
    for rank in 0..3 {
        let schedule = PairSchedule::new(layout(rank, 3));
        let owned: Vec<String> = schedule.owned(8).map(|i| i.to_string()).collect();
        let senders: Vec<String> = (0..8).map(|i| schedule.sender_of(i).to_string()).collect();
        lines.push(format!(
            "rank {rank}: computes={} owned=[{}] senders=[{}]",
            schedule.computes(),
            owned.join(","),
            senders.join(",")
        ));
    }
    insta::assert_snapshot!(lines.join("\n"), @r"
    rank 0: computes=false owned=[] senders=[1,2,1,2,1,2,1,2]
    rank 1: computes=true owned=[0,2,4,6] senders=[1,2,1,2,1,2,1,2]
    rank 2: computes=true owned=[1,3,5,7] senders=[1,2,1,2,1,2,1,2]
    ");
}

#[test]
fn dedup_covers_random_scenes() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10 {
        let table = random_scene(&mut rng, 12, 6);
        let outcome = Deduplicator::run(DedupConfig::default(), &table).expect("dedup");
        let missing = uncovered_in(&outcome.set, &table, table.indices()).expect("check");
        assert!(missing.is_empty());
    }
}

#[test]
fn every_canonical_entry_uniquely_covers_itself() {
    let mut rng = StdRng::seed_from_u64(11);
    let tol = Tolerance::default();
    for _ in 0..5 {
        let table = random_scene(&mut rng, 10, 5);
        let outcome = Deduplicator::run(DedupConfig::default(), &table).expect("dedup");
        let keys = outcome.set.keys();
        for skip in 0..keys.len() {
            let rest = CanonicalSet::from_keys(
                tol,
                keys.iter()
                    .enumerate()
                    .filter(|(i, _)| *i != skip)
                    .map(|(_, k)| *k),
            );
            assert!(
                !rest.covers(&keys[skip]),
                "entry {skip} is redundant"
            );
        }
    }
}

#[test]
fn accumulation_is_order_independent() {
    let mut rng = StdRng::seed_from_u64(3);
    let window = OutputWindow::new(0.0, 5.0, 0.05).expect("window");
    let parts: Vec<TimedTraces> = (0..6)
        .map(|_| {
            let start = rng.random_range(-1.0..3.0);
            let n = 40;
            TimedTraces {
                z: (0..n).map(|_| rng.random::<f64>()).collect(),
                e: (0..n).map(|_| rng.random::<f64>()).collect(),
                n: (0..n).map(|_| rng.random::<f64>()).collect(),
                t: (0..n).map(|k| start + k as f64 * 0.07).collect(),
            }
        })
        .collect();

    let mut forward = StationResponse::new(window);
    for p in &parts {
        forward.add(p).expect("add");
    }
    let order = [3, 0, 5, 1, 4, 2];
    let mut shuffled = StationResponse::new(window);
    for &i in &order {
        shuffled.add(&parts[i]).expect("add");
    }
    for (a, b) in forward.z().iter().zip(shuffled.z()) {
        assert!((a - b).abs() < 1e-9);
    }
    for (a, b) in forward.n().iter().zip(shuffled.n()) {
        assert!((a - b).abs() < 1e-9);
    }
    assert_eq!(forward.contributions(), shuffled.contributions());
}
