//! One rule set shared by many scanners.

use sigscan_rs::{demo_rules, Match, PatternId, ScanError, ScanState, Scanner};
use std::thread;

/// Distinct buffer per seed: line count, tags and injection points all vary.
fn corpus(seed: u32) -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..120 + seed * 3 {
        data.extend_from_slice(format!("line {i}/{seed}: ").as_bytes());
        if (i + seed) % 3 == 0 {
            data.extend_from_slice(b"run cmd.exe /c ");
        }
        if (i + seed) % 7 == 0 {
            data.extend_from_slice(b"MZ\x90\x00PE\0\0");
        }
        if (i * 3 + seed) % 11 == 0 {
            data.extend_from_slice(b"key=abcdefghijklmnopqrstuv ");
        }
        data.push(b'\n');
    }
    data
}

fn collect(scanner: &mut Scanner<'_>, data: &[u8]) -> Vec<(PatternId, Vec<Match>)> {
    assert_eq!(scanner.scan(data), ScanState::Completed);
    scanner
        .results()
        .matching()
        .map(|(id, m)| (id, m.to_vec()))
        .collect()
}

#[test]
fn concurrent_scanners_agree_with_solo_scan() {
    let rules = demo_rules().expect("demo rules");
    let max = rules.limits().max_threads;
    let buffers: Vec<Vec<u8>> = (0..max as u32).map(corpus).collect();

    let expected: Vec<_> = {
        let mut solo = Scanner::new(&rules).expect("solo scanner");
        buffers.iter().map(|data| collect(&mut solo, data)).collect()
    };
    assert!(expected.iter().all(|found| !found.is_empty()));
    assert_ne!(expected[0], expected[1]);
    assert_eq!(rules.active_scanners(), 0);

    let mut scanners: Vec<Scanner<'_>> = (0..max)
        .map(|_| Scanner::new(&rules).expect("scanner"))
        .collect();
    assert_eq!(rules.active_scanners(), max);
    assert!(matches!(
        Scanner::new(&rules),
        Err(ScanError::NoFreeSlot { max: m }) if m == max
    ));

    let mut slots: Vec<usize> = scanners.iter().map(|s| s.slot()).collect();
    slots.sort_unstable();
    slots.dedup();
    assert_eq!(slots.len(), max);

    thread::scope(|scope| {
        let handles: Vec<_> = scanners
            .drain(..)
            .zip(&buffers)
            .map(|(mut scanner, data)| scope.spawn(move || collect(&mut scanner, data)))
            .collect();
        for (i, (handle, want)) in handles.into_iter().zip(&expected).enumerate() {
            assert_eq!(&handle.join().expect("scan thread"), want, "buffer {i}");
        }
    });

    assert_eq!(rules.active_scanners(), 0);
    assert!(Scanner::new(&rules).is_ok());
}
