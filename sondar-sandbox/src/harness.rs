use std::collections::BTreeMap;

use sondar_core::RowSet;

pub(crate) const OUTCOME_SENTINEL: &str = "---SONDAR-OUTCOME---";

/// Python preamble executed around the analysis code. Placeholders are
/// substituted before the script is piped to the interpreter; snapshots and
/// code travel as JSON-encoded string literals so no quoting in the data can
/// break out of the script.
const HARNESS_TEMPLATE: &str = r##"
import base64 as _base64
import builtins as _builtins
import datetime
import io as _io
import json as _json
import sys as _sys
import traceback as _traceback
import warnings

import numpy as np
import pandas as pd
import matplotlib
matplotlib.use("Agg")
import matplotlib.pyplot as plt
import seaborn as sns

_MAX_RESULT_ROWS = @MAX_RESULT_ROWS@

_ALLOWED_IMPORT_ROOTS = {
    "numpy", "pandas", "matplotlib", "seaborn", "math", "statistics",
    "datetime", "json", "re", "warnings", "itertools", "collections",
}


def _safe_import(name, globals=None, locals=None, fromlist=(), level=0):
    if name.split(".")[0] not in _ALLOWED_IMPORT_ROOTS:
        raise ImportError("import of '%s' is not allowed" % name)
    return _builtins.__import__(name, globals, locals, fromlist, level)


_SAFE_BUILTIN_NAMES = [
    "abs", "all", "any", "bool", "dict", "divmod", "enumerate", "filter",
    "float", "format", "frozenset", "hash", "int", "isinstance",
    "issubclass", "iter", "len", "list", "map", "max", "min", "next",
    "pow", "print", "range", "repr", "reversed", "round", "set", "slice",
    "sorted", "str", "sum", "tuple", "type", "zip",
    "Exception", "BaseException", "ArithmeticError", "AttributeError",
    "IndexError", "KeyError", "LookupError", "RuntimeError",
    "StopIteration", "TypeError", "ValueError", "ZeroDivisionError",
    "True", "False", "None",
]
_safe_builtins = {}
for _name in _SAFE_BUILTIN_NAMES:
    if hasattr(_builtins, _name):
        _safe_builtins[_name] = getattr(_builtins, _name)
_safe_builtins["__import__"] = _safe_import


def _rasterize(fig):
    _buffer = _io.BytesIO()
    fig.savefig(_buffer, format="png", bbox_inches="tight")
    return _base64.b64encode(_buffer.getvalue()).decode("ascii")


class _PlotList(list):
    """Appending a figure transparently rasterizes it to a plot artifact."""

    def append(self, item):
        if hasattr(item, "savefig"):
            title = getattr(item, "_plot_title", "") or "Plot"
            super().append({"title": title, "png_base64": _rasterize(item)})
        else:
            super().append(item)


plots = _PlotList()
insights = []
execution_results = []


def save_plot(title="Plot"):
    fig = plt.gcf()
    fig._plot_title = str(title)
    plots.append(fig)


def add_insight(text, category="general"):
    insights.append({"text": str(text), "category": str(category)})


def _jsonable(value):
    if isinstance(value, pd.DataFrame):
        return _json.loads(value.head(_MAX_RESULT_ROWS).to_json(orient="records"))
    if isinstance(value, pd.Series):
        return _json.loads(value.head(_MAX_RESULT_ROWS).to_json())
    if isinstance(value, np.ndarray):
        return value[:_MAX_RESULT_ROWS].tolist()
    if isinstance(value, np.integer):
        return int(value)
    if isinstance(value, np.floating):
        return float(value)
    if value is None or isinstance(value, (str, int, float, bool)):
        return value
    if isinstance(value, dict):
        return dict((str(k), _jsonable(v)) for k, v in value.items())
    if isinstance(value, (list, tuple)):
        return [_jsonable(v) for v in value]
    return repr(value)


def show_results(value, title="Result"):
    execution_results.append({"title": str(title), "value": _jsonable(value)})


_globals = {
    "__builtins__": _safe_builtins,
    "np": np,
    "pd": pd,
    "plt": plt,
    "sns": sns,
    "datetime": datetime,
    "warnings": warnings,
    "plots": plots,
    "insights": insights,
    "execution_results": execution_results,
    "save_plot": save_plot,
    "add_insight": add_insight,
    "show_results": show_results,
}

for _table_name, _records in _json.loads(@TABLES_JSON@).items():
    _globals[_table_name] = pd.DataFrame(_records)

_captured_out = _io.StringIO()
_captured_err = _io.StringIO()
_outcome = {"success": True, "error": None, "traceback": None}
_sys.stdout = _captured_out
_sys.stderr = _captured_err
try:
    exec(compile(@CODE@, "<analysis>", "exec"), _globals)
except BaseException as _exc:
    _outcome["success"] = False
    _outcome["error"] = "%s: %s" % (type(_exc).__name__, _exc)
    _outcome["traceback"] = _traceback.format_exc()
finally:
    _sys.stdout = _sys.__stdout__
    _sys.stderr = _sys.__stderr__
    plt.close("all")

_outcome["stdout"] = _captured_out.getvalue()
_outcome["stderr"] = _captured_err.getvalue()
_outcome["plots"] = [p for p in plots if isinstance(p, dict)]
_outcome["insights"] = insights
_outcome["execution_results"] = execution_results

print("@SENTINEL@")
print(_json.dumps(_outcome, default=str))
"##;

/// Builds the full script for one run.
pub(crate) fn build_script(
    code: &str,
    snapshots: &[(String, RowSet)],
    max_result_rows: usize,
) -> Result<String, serde_json::Error> {
    let mut tables = BTreeMap::new();
    for (name, rows) in snapshots {
        tables.insert(name.clone(), rows.to_records());
    }
    // Double-encoded: the inner string is JSON data, the outer encoding
    // makes it a quoted literal that is valid Python source.
    let tables_literal = serde_json::to_string(&serde_json::to_string(&tables)?)?;
    let code_literal = serde_json::to_string(code)?;

    Ok(HARNESS_TEMPLATE
        .replace("@MAX_RESULT_ROWS@", &max_result_rows.to_string())
        .replace("@TABLES_JSON@", &tables_literal)
        .replace("@CODE@", &code_literal)
        .replace("@SENTINEL@", OUTCOME_SENTINEL))
}
