// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded Python driver for the sandbox child.
//!
//! The driver is the trusted half inside the child process: it installs
//! the import/builtin allow-lists and the poisoned socket module before
//! any plugin code runs, then serves NDJSON requests (`validate`,
//! `load`, `call`, `shutdown`) on stdin/stdout. Plugin failures are
//! reported in-band; the driver itself only exits when stdin closes.
//!
//! Passed to the interpreter via `python3 -I -c`, with an optional
//! address-space limit in bytes as the single argument.

/// The driver source, executed with `python3 -u -I -c`.
pub const PY_DRIVER: &str = r#"
import json
import sys
import types

ALLOWED_IMPORTS = {
    "math", "statistics", "re", "datetime", "json", "collections",
    "itertools", "functools", "string", "decimal", "unicodedata",
}

HOOK_STAGES = {
    "before_run", "before_row", "after_table_mapped",
    "after_table_transformed", "after_table_validated", "before_save",
    "after_run",
}

_REAL_IMPORT = __import__


def _guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    root = name.split(".")[0]
    if level != 0 or root not in ALLOWED_IMPORTS:
        raise ImportError("import of %r is not permitted" % name)
    return _REAL_IMPORT(name, globals, locals, fromlist, level)


class _PoisonedModule(types.ModuleType):
    def __getattr__(self, attr):
        raise RuntimeError("network access is not permitted")


sys.modules["socket"] = _PoisonedModule("socket")
sys.modules["_socket"] = _PoisonedModule("_socket")

import builtins as _builtins

_SAFE_NAMES = [
    "abs", "all", "any", "bool", "bytes", "callable", "chr", "dict",
    "divmod", "enumerate", "filter", "float", "format", "frozenset",
    "getattr", "hasattr", "hash", "hex", "int", "isinstance",
    "issubclass", "iter", "len", "list", "map", "max", "min", "next",
    "object", "ord", "pow", "range", "repr", "reversed", "round",
    "set", "setattr", "slice", "sorted", "str", "sum", "tuple", "type",
    "zip", "BaseException", "Exception", "ValueError", "TypeError",
    "KeyError", "IndexError", "AttributeError", "ArithmeticError",
    "ZeroDivisionError", "StopIteration", "RuntimeError", "ImportError",
    "NotImplementedError", "OverflowError", "LookupError", "True",
    "False", "None", "NotImplemented", "Ellipsis",
]


def _safe_builtins():
    safe = {}
    for name in _SAFE_NAMES:
        if hasattr(_builtins, name):
            safe[name] = getattr(_builtins, name)
    safe["__import__"] = _guarded_import
    safe["__build_class__"] = _builtins.__build_class__
    safe["print"] = lambda *args, **kwargs: None
    return safe


class Registry:
    def __init__(self):
        self.fields = []
        self.field_names = set()
        self.detectors = []
        self.transforms = []
        self.validators = []
        self.hooks = []
        self.carry_passthrough = False
        self.errors = {}
        self.handles = {}
        self.next_handle = 0

    def error(self, location, message):
        self.errors.setdefault(location, []).append(message)

    def field(self, name, required=False):
        if name in self.field_names:
            self.error("field.%s" % name, "duplicate field registration")
            return
        self.field_names.add(name)
        self.fields.append({"name": name, "required": bool(required)})

    def passthrough(self, enabled=True):
        self.carry_passthrough = bool(enabled)

    def _record(self, fn, priority):
        handle = self.next_handle
        self.next_handle += 1
        self.handles[handle] = fn
        name = getattr(fn, "__qualname__", None)
        if not name:
            name = getattr(fn, "__name__", "<anonymous>")
        return {
            "handle": handle,
            "priority": int(priority),
            "module": getattr(fn, "__module__", None) or "plugin",
            "qualname": name,
        }

    def _capability(self, collection, kind, field, priority):
        def decorate(fn):
            if field not in self.field_names:
                location = "%s.%s" % (kind, getattr(fn, "__name__", "<anonymous>"))
                self.error(
                    location,
                    "field %r must be registered before its %ss" % (field, kind),
                )
                return fn
            entry = self._record(fn, priority)
            entry["field"] = field
            collection.append(entry)
            return fn

        return decorate

    def detector(self, field, priority=0):
        return self._capability(self.detectors, "detector", field, priority)

    def transform(self, field, priority=0):
        return self._capability(self.transforms, "transform", field, priority)

    def validator(self, field, priority=0):
        return self._capability(self.validators, "validator", field, priority)

    def hook(self, stage, priority=0):
        def decorate(fn):
            if stage not in HOOK_STAGES:
                location = "hook.%s" % getattr(fn, "__name__", "<anonymous>")
                self.error(location, "unknown hook stage %r" % stage)
                return fn
            entry = self._record(fn, priority)
            entry["stage"] = stage
            self.hooks.append(entry)
            return fn

        return decorate


def load_plugin(code):
    registry = Registry()
    module = types.ModuleType("plugin")
    module.__dict__["__builtins__"] = _safe_builtins()
    try:
        exec(compile(code, "plugin.py", "exec"), module.__dict__)
    except SyntaxError as exc:
        registry.error("syntax", "line %s: %s" % (exc.lineno, exc.msg))
        return registry
    except ImportError as exc:
        registry.error("import", str(exc))
        return registry
    except BaseException as exc:
        registry.error("exec", "%s: %s" % (type(exc).__name__, exc))
        return registry
    entry = module.__dict__.get("register")
    if not callable(entry):
        registry.error(
            "entrypoint", "plugin does not define a register(registry) entrypoint"
        )
        return registry
    try:
        entry(registry)
    except ImportError as exc:
        registry.error("import", str(exc))
    except BaseException as exc:
        registry.error("register", "%s: %s" % (type(exc).__name__, exc))
    return registry


def check_contracts(registry):
    sample = {"header": "sample", "values": ["1", "2", "3"], "index": 0, "sheet": "Sheet1"}
    for entry in registry.detectors:
        fn = registry.handles[entry["handle"]]
        location = entry["qualname"]
        ctx = dict(sample)
        ctx["field"] = entry["field"]
        try:
            out = fn(ctx)
        except BaseException as exc:
            registry.error(location, "detector raised %s: %s" % (type(exc).__name__, exc))
            continue
        scores = out.get("scores") if isinstance(out, dict) else None
        if not isinstance(scores, dict) or not scores:
            registry.error(
                location,
                "detector must return a mapping with a non-empty 'scores' mapping",
            )
            continue
        for key, value in scores.items():
            if (
                not isinstance(key, str)
                or isinstance(value, bool)
                or not isinstance(value, (int, float))
            ):
                registry.error(
                    location, "score for %r must map a string field to a number" % key
                )
    for entry in registry.transforms:
        fn = registry.handles[entry["handle"]]
        location = entry["qualname"]
        try:
            out = fn({"field": entry["field"], "value": "1", "row": {entry["field"]: "1"}})
        except BaseException as exc:
            registry.error(
                location, "transform raised %s: %s" % (type(exc).__name__, exc)
            )
            continue
        if not isinstance(out, dict) or not isinstance(out.get("cells"), dict):
            registry.error(
                location, "transform must return a mapping with a 'cells' mapping"
            )


def registrations(registry):
    return {
        "fields": registry.fields,
        "detectors": registry.detectors,
        "transforms": registry.transforms,
        "validators": registry.validators,
        "hooks": registry.hooks,
        "carry_passthrough": registry.carry_passthrough,
    }


def reply(payload):
    try:
        line = json.dumps(payload, default=str)
    except (TypeError, ValueError):
        line = json.dumps(
            {"ok": False, "error": {"code": "protocol", "message": "unserializable response"}}
        )
    sys.stdout.write(line + "\n")
    sys.stdout.flush()


def handle_call(registry, request):
    if registry is None:
        return {"ok": False, "error": {"code": "protocol", "message": "no plugin loaded"}}
    handle = request.get("handle")
    fn = registry.handles.get(handle)
    if fn is None:
        return {
            "ok": False,
            "error": {"code": "protocol", "message": "unknown handle %r" % handle},
        }
    try:
        value = fn(request.get("ctx"))
    except BaseException as exc:
        return {
            "ok": True,
            "result": {
                "error": {
                    "code": "exception",
                    "message": "%s: %s" % (type(exc).__name__, exc),
                }
            },
        }
    return {"ok": True, "result": {"value": value}}


def main():
    if len(sys.argv) > 1:
        try:
            limit = int(sys.argv[1])
        except ValueError:
            limit = 0
        if limit > 0:
            try:
                import resource

                resource.setrlimit(resource.RLIMIT_AS, (limit, limit))
            except (ImportError, ValueError, OSError):
                pass

    registry = None
    while True:
        line = sys.stdin.readline()
        if not line:
            break
        line = line.strip()
        if not line:
            continue
        try:
            request = json.loads(line)
        except ValueError:
            reply({"ok": False, "error": {"code": "protocol", "message": "request is not valid JSON"}})
            continue
        op = request.get("op")
        if op == "shutdown":
            reply({"ok": True})
            break
        if op in ("validate", "load"):
            registry = load_plugin(request.get("code", ""))
            if op == "validate" and not registry.errors:
                check_contracts(registry)
            reply(
                {
                    "ok": True,
                    "errors": registry.errors,
                    "registrations": registrations(registry),
                }
            )
        elif op == "call":
            reply(handle_call(registry, request))
        else:
            reply({"ok": False, "error": {"code": "protocol", "message": "unknown op %r" % op}})


main()
"#;

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
