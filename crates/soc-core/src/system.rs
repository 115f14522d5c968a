//! Two-clock scheduler owning every component of the model.
//!
//! Memory-domain step order: commit a staged line and sample the
//! synchronizer, advance the processor and monitor, then let the arbiter
//! forward one request and clock the controller. Pixel-domain steps only
//! advance the scanout reader. Coincident edges run the memory domain first.

use std::fmt;

use crate::api::{
    Program, RunBoundary, RunOutcome, SimConfig, SimContext, StopReason, TraceEvent, TraceSink,
};
use crate::arbiter::MemoryArbiter;
use crate::bus::{BurstClient, BusEvent, CLIENT_COUNT};
use crate::controller::BurstController;
use crate::diag::Diagnostics;
use crate::execute::ProcessorCore;
use crate::fault::{Fault, SimError};
use crate::memory::{BackingMemory, MemoryImage};
use crate::monitor::DiagnosticMonitor;
use crate::scanout::{LineRecord, ScanoutPipeline};
use crate::state::RegisterFile;
use crate::timing::{ClockConfig, ClockDomain};

/// Discrete-event clock pair. Edges fall at whole multiples of each period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DualClock {
    memory_period_ps: u64,
    pixel_period_ps: u64,
    next_memory_ps: u64,
    next_pixel_ps: u64,
}

impl DualClock {
    /// Creates a clock pair whose first edges fall one period after zero.
    #[must_use]
    pub fn new(clocks: &ClockConfig) -> Self {
        let memory_period_ps = u64::from(clocks.memory_period_ps.max(1));
        let pixel_period_ps = u64::from(clocks.pixel_period_ps.max(1));
        Self {
            memory_period_ps,
            pixel_period_ps,
            next_memory_ps: memory_period_ps,
            next_pixel_ps: pixel_period_ps,
        }
    }

    /// Time of the edge most recently returned by [`DualClock::advance`].
    #[must_use]
    pub const fn now_ps(&self) -> u64 {
        let memory = self.next_memory_ps - self.memory_period_ps;
        let pixel = self.next_pixel_ps - self.pixel_period_ps;
        if memory > pixel {
            memory
        } else {
            pixel
        }
    }

    /// Pops the next edge; the memory domain wins ties.
    pub const fn advance(&mut self) -> ClockDomain {
        if self.next_memory_ps <= self.next_pixel_ps {
            self.next_memory_ps += self.memory_period_ps;
            ClockDomain::Memory
        } else {
            self.next_pixel_ps += self.pixel_period_ps;
            ClockDomain::Pixel
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RunStart {
    memory_cycles: u64,
    pixel_cycles: u64,
    lines: u64,
    pulses: u64,
}

/// The whole system: processor, monitor, arbiter, controller, backing store
/// and scanout pipeline.
pub struct System {
    config: SimConfig,
    ctx: SimContext,
    clock: DualClock,
    memory: BackingMemory,
    controller: BurstController,
    arbiter: MemoryArbiter,
    cpu: ProcessorCore,
    monitor: DiagnosticMonitor,
    pipeline: ScanoutPipeline,
    memory_cycles: u64,
    pixel_cycles: u64,
    events: Vec<TraceEvent>,
    trace: Option<Box<dyn TraceSink>>,
    latched: Option<SimError>,
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("memory_cycles", &self.memory_cycles)
            .field("pixel_cycles", &self.pixel_cycles)
            .field("processor", &self.cpu.state())
            .field("controller", &self.controller.state())
            .field("latched", &self.latched)
            .finish_non_exhaustive()
    }
}

impl System {
    /// Validates `config`, loads `image` into a backing store covering the
    /// address map and puts every component in reset.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] when the configuration or image is
    /// rejected.
    pub fn new(config: SimConfig, program: Program, image: &MemoryImage) -> Result<Self, SimError> {
        config.validate()?;
        let mut memory = BackingMemory::new(config.address_map.extent_bytes());
        image.load_into(&mut memory)?;
        let cpu = ProcessorCore::new(
            program.into_words(),
            &config.address_map,
            config.strict_decode,
        )?;
        let pipeline = ScanoutPipeline::new(&config)?;
        log::debug!(
            "system reset: {} bytes of backing store, line period {} memory cycles",
            memory.size_bytes(),
            config.display.line_period_memory_cycles(&config.clocks)
        );
        Ok(Self {
            clock: DualClock::new(&config.clocks),
            controller: BurstController::new(config.timing),
            config,
            ctx: SimContext::default(),
            memory,
            arbiter: MemoryArbiter::new(),
            cpu,
            monitor: DiagnosticMonitor::new(),
            pipeline,
            memory_cycles: 0,
            pixel_cycles: 0,
            events: Vec::new(),
            trace: None,
            latched: None,
        })
    }

    /// Configuration the system was built with.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Host flags.
    #[must_use]
    pub const fn context(&self) -> &SimContext {
        &self.ctx
    }

    /// Host flags, for the host to write.
    pub const fn context_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    /// Processor core.
    #[must_use]
    pub const fn processor(&self) -> &ProcessorCore {
        &self.cpu
    }

    /// Final or current register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        self.cpu.registers()
    }

    /// Diagnostic monitor.
    #[must_use]
    pub const fn monitor(&self) -> &DiagnosticMonitor {
        &self.monitor
    }

    /// Diagnostic monitor, for queueing host commands.
    pub const fn monitor_mut(&mut self) -> &mut DiagnosticMonitor {
        &mut self.monitor
    }

    /// Burst controller.
    #[must_use]
    pub const fn controller(&self) -> &BurstController {
        &self.controller
    }

    /// Memory arbiter.
    #[must_use]
    pub const fn arbiter(&self) -> &MemoryArbiter {
        &self.arbiter
    }

    /// Scanout pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &ScanoutPipeline {
        &self.pipeline
    }

    /// Backing store.
    #[must_use]
    pub const fn memory(&self) -> &BackingMemory {
        &self.memory
    }

    /// Memory-domain cycles stepped.
    #[must_use]
    pub const fn memory_cycles(&self) -> u64 {
        self.memory_cycles
    }

    /// Pixel-domain cycles stepped.
    #[must_use]
    pub const fn pixel_cycles(&self) -> u64 {
        self.pixel_cycles
    }

    /// The fault that stopped the model, if any.
    #[must_use]
    pub const fn latched_error(&self) -> Option<&SimError> {
        self.latched.as_ref()
    }

    /// Scanned line records in order.
    #[must_use]
    pub fn line_records(&self) -> &[LineRecord] {
        self.pipeline.reader().records()
    }

    /// Drains the scanned line records.
    pub fn take_line_records(&mut self) -> Vec<LineRecord> {
        self.pipeline.reader_mut().take_records()
    }

    /// Installs a trace sink; events produced from now on are delivered to
    /// it in order.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace = Some(sink);
    }

    /// Removes and returns the installed trace sink.
    pub fn take_trace_sink(&mut self) -> Option<Box<dyn TraceSink>> {
        self.trace.take()
    }

    /// Snapshot of every counter.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        let reader = self.pipeline.reader();
        let fills = self.pipeline.fill_stats();
        Diagnostics {
            memory_cycles: self.memory_cycles,
            pixel_cycles: self.pixel_cycles,
            instructions_retired: self.cpu.retired_count(),
            unknown_instructions: self.cpu.unknown_count(),
            self_test_passed: self.cpu.self_test_passed(),
            arbiter: *self.arbiter.stats(),
            refreshes: self.controller.refresh_count(),
            lines_scanned: reader.lines_scanned(),
            underruns: reader.underruns(),
            fills_committed: fills.committed,
            fills_discarded: fills.discarded,
            fills_abandoned: self.pipeline.filler().abandoned_count(),
            sync_pulses: reader.sync_pulses(),
            frame_swaps: reader.frames().swaps(),
        }
    }

    /// Advances the next clock edge and returns the domain that stepped.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Fault`] when a component raises a fatal fault;
    /// the model then latches and every later call returns
    /// [`SimError::Latched`].
    pub fn step(&mut self) -> Result<ClockDomain, SimError> {
        if self.latched.is_some() {
            return Err(SimError::Latched);
        }
        let domain = self.clock.advance();
        let result = match domain {
            ClockDomain::Memory => self.memory_step(),
            ClockDomain::Pixel => self.pixel_step(),
        };
        self.flush_trace();

        if let Err(fault) = result {
            let cycle = match domain {
                ClockDomain::Memory => self.memory_cycles,
                ClockDomain::Pixel => self.pixel_cycles,
            };
            log::error!("fatal {fault} in {domain:?} domain at cycle {cycle}");
            let error = SimError::Fault {
                fault,
                domain,
                cycle,
            };
            self.latched = Some(error.clone());
            return Err(error);
        }
        Ok(domain)
    }

    /// Steps until `boundary` is reached or `max_memory_cycles` memory
    /// cycles have elapsed in this call.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`System::step`].
    pub fn run(
        &mut self,
        boundary: RunBoundary,
        max_memory_cycles: u64,
    ) -> Result<RunOutcome, SimError> {
        let start = RunStart {
            memory_cycles: self.memory_cycles,
            pixel_cycles: self.pixel_cycles,
            lines: self.pipeline.reader().lines_scanned(),
            pulses: self.pipeline.reader().sync_pulses(),
        };
        loop {
            if self.boundary_reached(boundary, start) {
                return Ok(self.outcome(StopReason::BoundaryReached, start));
            }
            if self.memory_cycles - start.memory_cycles >= max_memory_cycles {
                return Ok(self.outcome(StopReason::CycleLimit, start));
            }
            self.step()?;
        }
    }

    fn boundary_reached(&self, boundary: RunBoundary, start: RunStart) -> bool {
        let reader = self.pipeline.reader();
        match boundary {
            RunBoundary::ProcessorHalted => self.cpu.state().is_terminal(),
            RunBoundary::LinesScanned(lines) => reader.lines_scanned() - start.lines >= lines,
            RunBoundary::Frames(frames) => reader.sync_pulses() - start.pulses >= frames,
            RunBoundary::MemoryCycles(cycles) => {
                self.memory_cycles - start.memory_cycles >= cycles
            }
            RunBoundary::MonitorIdle => self.monitor.is_idle(),
        }
    }

    const fn outcome(&self, stop: StopReason, start: RunStart) -> RunOutcome {
        RunOutcome {
            stop,
            memory_cycles: self.memory_cycles - start.memory_cycles,
            pixel_cycles: self.pixel_cycles - start.pixel_cycles,
        }
    }

    fn memory_step(&mut self) -> Result<(), Fault> {
        self.memory_cycles += 1;
        self.pipeline.memory_step(&mut self.events);
        self.cpu.step(&self.ctx)?;
        self.monitor.step();

        let mut clients: [&mut dyn BurstClient; CLIENT_COUNT] = [
            &mut self.monitor,
            &mut self.cpu,
            self.pipeline.filler_mut(),
        ];
        let event = self
            .arbiter
            .step(&mut self.controller, &mut self.memory, &mut clients)?;
        let cycle = self.controller.cycle();
        match event {
            Some(BusEvent::Grant(request)) => {
                self.events.push(TraceEvent::BusGrant { cycle, request });
            }
            Some(BusEvent::Finish(request)) => {
                self.events.push(TraceEvent::BusFinish { cycle, request });
            }
            Some(BusEvent::Refresh) => self.events.push(TraceEvent::Refresh { cycle }),
            Some(BusEvent::Word { .. }) | None => {}
        }

        if let Some(retired) = self.cpu.take_retired() {
            self.events.push(TraceEvent::InstructionRetired {
                pc: retired.pc,
                word: retired.instruction.word(),
            });
        }
        Ok(())
    }

    fn pixel_step(&mut self) -> Result<(), Fault> {
        self.pixel_cycles += 1;
        self.pipeline.pixel_step(&self.ctx, &mut self.events)
    }

    fn flush_trace(&mut self) {
        match self.trace.as_mut() {
            Some(sink) => {
                for event in self.events.drain(..) {
                    sink.on_event(event);
                }
            }
            None => self.events.clear(),
        }
    }
}
