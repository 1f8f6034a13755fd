use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use ulid::Ulid;

use innkeep::engine::{Engine, EngineError, RoomFilter};
use innkeep::model::{RoomSpec, UserProfile};

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn night(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 1).unwrap() + Days::new(offset)
}

struct Hotel {
    engine: Arc<Engine>,
    rooms: Vec<Ulid>,
    guest: Ulid,
}

async fn setup(n_rooms: usize) -> Hotel {
    let dir = std::env::temp_dir().join(format!("innkeep_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let engine = Arc::new(Engine::new(dir.join("innkeep.wal")).unwrap());

    let rt = engine.create_room_type("Standard", None).await.unwrap();
    let mut rooms = Vec::with_capacity(n_rooms);
    for i in 0..n_rooms {
        let room = engine
            .create_room(RoomSpec {
                name: format!("Room {i}"),
                description: None,
                room_type_id: rt.id,
                photos: vec![],
                price: 800_000.0,
                discount: 5.0,
                amenities: vec![],
            })
            .await
            .unwrap();
        rooms.push(room.id);
    }
    let guest = engine
        .save_user(UserProfile {
            id: Ulid::new(),
            username: "bench".into(),
            email: "bench@example.com".into(),
            phone: String::new(),
        })
        .await
        .unwrap()
        .id;
    println!("  created {} rooms", rooms.len());
    Hotel {
        engine,
        rooms,
        guest,
    }
}

async fn phase1_sequential(hotel: &Hotel) {
    let room = hotel.rooms[0];
    let n = 1500;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n as u64 {
        let t = Instant::now();
        hotel
            .engine
            .place_booking(hotel.guest, room, night(i), night(i + 1))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("place latency", &mut latencies);
}

/// Many tasks fight over the same nights of one room; exactly one may win each night.
async fn phase2_contended(hotel: &Hotel) {
    let room = hotel.rooms[1];
    let n_tasks = 32;
    let nights = 200u64;
    let won = Arc::new(AtomicUsize::new(0));
    let lost = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::new();
    for _ in 0..n_tasks {
        let engine = hotel.engine.clone();
        let guest = hotel.guest;
        let won = won.clone();
        let lost = lost.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..nights {
                match engine.place_booking(guest, room, night(i), night(i + 1)).await {
                    Ok(_) => won.fetch_add(1, Ordering::Relaxed),
                    Err(EngineError::Conflict(_)) => lost.fetch_add(1, Ordering::Relaxed),
                    Err(e) => panic!("unexpected error: {e}"),
                };
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks as u64 * nights;
    let won = won.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} tasks x {nights} nights = {total} requests in {:.2}s = {:.0} ops/sec",
        elapsed.as_secs_f64(),
        total as f64 / elapsed.as_secs_f64()
    );
    println!(
        "  {won} admitted, {} rejected as conflicts",
        lost.load(Ordering::Relaxed)
    );
    assert_eq!(won as u64, nights, "double booking detected");
}

async fn phase3_search_under_load(hotel: &Hotel) {
    let stop = Arc::new(AtomicBool::new(false));
    let mut writers = Vec::new();
    for (w, &room) in hotel.rooms[2..].iter().enumerate().take(4) {
        let engine = hotel.engine.clone();
        let guest = hotel.guest;
        let stop = stop.clone();
        writers.push(tokio::spawn(async move {
            let mut i = 0u64;
            while !stop.load(Ordering::Relaxed) && i < 300 {
                let _ = engine
                    .place_booking(guest, room, night(w as u64 * 1000 + i), night(w as u64 * 1000 + i + 1))
                    .await;
                i += 1;
            }
        }));
    }

    let mut readers = Vec::new();
    for r in 0..8u64 {
        let engine = hotel.engine.clone();
        readers.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(300);
            for i in 0..300u64 {
                let filter = RoomFilter {
                    check_in: Some(night(r * 10 + i % 50)),
                    check_out: Some(night(r * 10 + i % 50 + 3)),
                    ..RoomFilter::default()
                };
                let t = Instant::now();
                engine.list_rooms(&filter).await.unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in readers {
        all.extend(h.await.unwrap());
    }
    stop.store(true, Ordering::Relaxed);
    for h in writers {
        let _ = h.await;
    }
    print_latency("availability search", &mut all);
}

async fn phase4_compaction(hotel: &Hotel) {
    let appends = hotel.engine.wal_appends_since_compact().await;
    let start = Instant::now();
    hotel.engine.compact_wal().await.unwrap();
    println!(
        "  compacted {appends} appends in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
}

#[tokio::main]
async fn main() {
    println!("=== innkeep stress benchmark ===\n");

    println!("[setup]");
    let hotel = setup(10).await;

    println!("\n[phase 1] sequential booking throughput");
    phase1_sequential(&hotel).await;

    println!("\n[phase 2] contended booking on one room");
    phase2_contended(&hotel).await;

    println!("\n[phase 3] availability search under write load");
    phase3_search_under_load(&hotel).await;

    println!("\n[phase 4] WAL compaction");
    phase4_compaction(&hotel).await;

    println!("\n=== done ===");
}
