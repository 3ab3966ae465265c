use std::collections::VecDeque;

use crossbeam::queue::SegQueue;
use parking_lot::Mutex;

use crate::scheduler::policy::QueueDiscipline;
use crate::scheduler::task::Task;

/// One queue of tasks owned by one worker at one priority level.
///
/// FIFO queues are lock-free. Queues where the owner and thieves may work at different ends
/// use a short-lived lock around a ring buffer.
#[derive(Debug)]
pub(crate) enum TaskQueue {
    Fifo(SegQueue<Task>),
    Locked {
        tasks: Mutex<VecDeque<Task>>,
        steal_from_front: bool,
    },
}

impl TaskQueue {
    pub(crate) fn new(discipline: QueueDiscipline) -> Self {
        match discipline {
            QueueDiscipline::Fifo => Self::Fifo(SegQueue::new()),
            QueueDiscipline::Lifo => Self::Locked {
                tasks: Mutex::new(VecDeque::new()),
                steal_from_front: false,
            },
            QueueDiscipline::Deque => Self::Locked {
                tasks: Mutex::new(VecDeque::new()),
                steal_from_front: true,
            },
        }
    }

    pub(crate) fn push(&self, task: Task) {
        match self {
            Self::Fifo(queue) => queue.push(task),
            Self::Locked { tasks, .. } => tasks.lock().push_back(task),
        }
    }

    /// Takes the task the owning worker should execute next.
    pub(crate) fn pop(&self) -> Option<Task> {
        match self {
            Self::Fifo(queue) => queue.pop(),
            Self::Locked { tasks, .. } => tasks.lock().pop_back(),
        }
    }

    /// Takes the task a thief should execute next.
    pub(crate) fn steal(&self) -> Option<Task> {
        match self {
            Self::Fifo(queue) => queue.pop(),
            Self::Locked {
                tasks,
                steal_from_front,
            } => {
                let mut tasks = tasks.lock();

                if *steal_from_front {
                    tasks.pop_front()
                } else {
                    tasks.pop_back()
                }
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Fifo(queue) => queue.len(),
            Self::Locked { tasks, .. } => tasks.lock().len(),
        }
    }

    /// Removes every task, oldest first.
    pub(crate) fn drain(&self) -> Vec<Task> {
        match self {
            Self::Fifo(queue) => {
                let mut drained = Vec::with_capacity(queue.len());

                while let Some(task) = queue.pop() {
                    drained.push(task);
                }

                drained
            }
            Self::Locked { tasks, .. } => tasks.lock().drain(..).collect(),
        }
    }

    /// Releases excess storage left behind by a burst of work.
    ///
    /// Returns whether anything was released.
    pub(crate) fn compact(&self) -> bool {
        match self {
            // Segments are already released as they empty.
            Self::Fifo(_) => false,
            Self::Locked { tasks, .. } => {
                let Some(mut tasks) = tasks.try_lock() else {
                    return false;
                };

                if tasks.is_empty() && tasks.capacity() > 0 {
                    tasks.shrink_to_fit();
                    true
                } else {
                    false
                }
            }
        }
    }
}
