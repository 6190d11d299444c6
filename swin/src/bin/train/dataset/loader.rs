use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use swin::Error;

use super::transforms::Transform;
use super::ImageSample;

// Holds x items in the channel per worker
const CHANNEL_BUFFER_MULTIPLIER: usize = 2;

// Odd multiplier separating the chunk seeds of different loader seeds
const SEED_SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;

/// A chunk of samples and its position in the epoch.
type Chunk = (usize, Vec<ImageSample>);

/// Images of a batch as consecutive CHW buffers, and their labels.
#[derive(Debug, Default)]
pub struct Batch {
    pub images: Vec<f32>,
    pub labels: Vec<u32>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Multi-threaded data loader that decodes images on demand.
///
/// Workers pull indexed chunks of samples, decode and transform them, and
/// send the finished batches through a bounded channel. Every chunk draws its
/// augmentations from its own generator seeded by the loader seed and the
/// chunk index, and batches are handed out in sample order, so the output
/// does not depend on the number of workers or on thread scheduling. A
/// sample that cannot be read is reported as an error in place of its batch.
pub struct DataLoader {
    receiver: Option<mpsc::Receiver<(usize, swin::Result<Batch>)>>,
    workers: Vec<thread::JoinHandle<()>>,
    pending: AHashMap<usize, swin::Result<Batch>>,
    next_index: usize,
    num_samples: usize,
}

impl DataLoader {
    pub fn new(
        samples: &[ImageSample],
        transform: Transform,
        batch_size: usize,
        num_workers: usize,
        seed: u64,
    ) -> Self {
        let num_workers = num_workers.max(1);
        let batch_size = batch_size.max(1);

        let (sender, receiver) = mpsc::sync_channel(num_workers * CHANNEL_BUFFER_MULTIPLIER);
        let (work_sender, work_receiver) =
            mpsc::sync_channel::<Chunk>(num_workers * CHANNEL_BUFFER_MULTIPLIER);
        let work_receiver = Arc::new(Mutex::new(work_receiver));

        let workers = Self::spawn_workers(num_workers, work_receiver, sender, transform, seed);

        // Distribute batches to workers
        let shared_samples = samples.to_vec();
        thread::spawn(move || {
            for (index, chunk) in shared_samples.chunks(batch_size).enumerate() {
                if work_sender.send((index, chunk.to_vec())).is_err() {
                    break;
                }
            }
        });

        Self {
            receiver: Some(receiver),
            workers,
            pending: AHashMap::new(),
            next_index: 0,
            num_samples: samples.len(),
        }
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    fn spawn_workers(
        num_workers: usize,
        work_receiver: Arc<Mutex<mpsc::Receiver<Chunk>>>,
        sender: mpsc::SyncSender<(usize, swin::Result<Batch>)>,
        transform: Transform,
        seed: u64,
    ) -> Vec<thread::JoinHandle<()>> {
        (0..num_workers)
            .map(|_| {
                let rx = Arc::clone(&work_receiver);
                let tx = sender.clone();

                thread::spawn(move || loop {
                    let next = match rx.lock() {
                        Ok(receiver) => receiver.recv(),
                        Err(_) => break,
                    };
                    let (index, samples) = match next {
                        Ok(work) => work,
                        Err(_) => break,
                    };

                    let mut rng = StdRng::seed_from_u64(chunk_seed(seed, index));
                    let batch = Self::process_batch(&samples, &transform, &mut rng);
                    if tx.send((index, batch)).is_err() {
                        break;
                    }
                })
            })
            .collect()
    }

    fn process_batch(
        samples: &[ImageSample],
        transform: &Transform,
        rng: &mut StdRng,
    ) -> swin::Result<Batch> {
        let mut batch = Batch {
            images: Vec::with_capacity(samples.len() * transform.output_len()),
            labels: Vec::with_capacity(samples.len()),
        };

        for sample in samples {
            let img = image::open(&sample.path)
                .map_err(|e| Error::Image(sample.path.clone(), e))?;

            batch.images.extend(transform.apply(&img, rng));
            batch.labels.push(sample.label);
        }

        Ok(batch)
    }
}

/// Generator seed of one chunk. Distinct loader seeds (one per epoch) are
/// spread apart so their chunk streams do not overlap.
fn chunk_seed(seed: u64, index: usize) -> u64 {
    seed.wrapping_mul(SEED_SPREAD).wrapping_add(index as u64)
}

impl Iterator for DataLoader {
    type Item = swin::Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(batch) = self.pending.remove(&self.next_index) {
                self.next_index += 1;
                return Some(batch);
            }

            let (index, batch) = self.receiver.as_ref()?.recv().ok()?;
            self.pending.insert(index, batch);
        }
    }
}

impl Drop for DataLoader {
    fn drop(&mut self) {
        // Hang up first so workers blocked on a full channel can exit
        self.receiver.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
